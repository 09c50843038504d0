// Copyright 2025 The kmesh Authors
//
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//

use super::{
    cluster::Cluster, listener::Listener, network_filters::http_connection_manager::route::RouterConfiguration,
};
use serde::Serialize;

/// The translated form of one discovery snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub listeners: Vec<Listener>,
    pub clusters: Vec<Cluster>,
    pub routers: Vec<RouterConfiguration>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.clusters.is_empty() && self.routers.is_empty()
    }
}

#[cfg(feature = "envoy-conversions")]
mod envoy_conversions {
    use super::Snapshot;
    use crate::config::{
        cluster::{envoy_conversions::convert_load_assignment, Cluster},
        common::*,
    };
    use mosn_data_plane_api::{envoy_v2_api::envoy::api::v2::ClusterLoadAssignment, DiscoverySnapshot};
    use tracing::{debug, warn};

    impl TryFrom<DiscoverySnapshot> for Snapshot {
        type Error = GenericError;
        fn try_from(envoy: DiscoverySnapshot) -> Result<Self, Self::Error> {
            let DiscoverySnapshot { listeners, clusters, route_configs, endpoints } = envoy;
            let listeners = convert_vec!(listeners)?;
            let mut clusters: Vec<Cluster> = convert_vec!(clusters)?;
            let routers = convert_vec!(route_configs)?;
            for (index, assignment) in endpoints.iter().enumerate() {
                let ClusterLoadAssignment { cluster_name, .. } = assignment;
                let Some(cluster) = clusters.iter_mut().find(|c| c.assignment_name() == cluster_name.as_str()) else {
                    warn!("endpoint assignment for unknown cluster {cluster_name} ignored");
                    continue;
                };
                cluster.hosts = convert_load_assignment(assignment)
                    .with_name(cluster_name.as_str())
                    .with_index(index)
                    .with_node("endpoints")?;
                debug!("cluster {} has {} hosts", cluster.name, cluster.hosts.len());
            }
            Ok(Snapshot { listeners, clusters, routers })
        }
    }

}
