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

use compact_str::CompactString;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcpProxy {
    pub stat_prefix: CompactString,
    #[serde(flatten)]
    pub cluster: TcpProxyCluster,
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connect_attempts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpProxyCluster {
    Cluster(CompactString),
    WeightedClusters(Vec<WeightedCluster>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightedCluster {
    pub name: CompactString,
    pub weight: u32,
}

#[cfg(feature = "envoy-conversions")]
mod envoy_conversions {
    use super::{TcpProxy, TcpProxyCluster, WeightedCluster};
    use crate::config::{common::*, core::envoy_conversions::convert_duration};
    use mosn_data_plane_api::envoy_v2_api::envoy::config::filter::network::tcp_proxy::v2::{
        tcp_proxy::{weighted_cluster::ClusterWeight as EnvoyClusterWeight, ClusterSpecifier, WeightedCluster as EnvoyWeightedCluster},
        TcpProxy as EnvoyTcpProxy,
    };

    impl TryFrom<EnvoyClusterWeight> for WeightedCluster {
        type Error = GenericError;
        fn try_from(envoy: EnvoyClusterWeight) -> Result<Self, Self::Error> {
            let EnvoyClusterWeight { name, weight } = envoy;
            let name = required!(name)?;
            Ok(Self { name: name.into(), weight })
        }
    }

    impl TryFrom<EnvoyTcpProxy> for TcpProxy {
        type Error = GenericError;
        fn try_from(envoy: EnvoyTcpProxy) -> Result<Self, Self::Error> {
            let EnvoyTcpProxy { stat_prefix, metadata_match, idle_timeout, max_connect_attempts, cluster_specifier } =
                envoy;
            unsupported_field!(metadata_match)?;
            let cluster = match required!(cluster_specifier)? {
                ClusterSpecifier::Cluster(cluster) => TcpProxyCluster::Cluster(required!(cluster)?.into()),
                ClusterSpecifier::WeightedClusters(EnvoyWeightedCluster { clusters }) => {
                    TcpProxyCluster::WeightedClusters(convert_non_empty_vec!(clusters).with_node("weighted_clusters")?)
                },
            };
            Ok(Self {
                stat_prefix: stat_prefix.into(),
                cluster,
                idle_timeout: idle_timeout.map(convert_duration),
                max_connect_attempts,
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use mosn_data_plane_api::decode::from_yaml_str;

        #[test]
        fn single_cluster() {
            let envoy: EnvoyTcpProxy =
                from_yaml_str("stat_prefix: mysql\ncluster: \"outbound|3306||mysql\"\nidle_timeout: 90s").unwrap();
            let proxy = TcpProxy::try_from(envoy).unwrap();
            assert_eq!(
                serde_json::to_string(&proxy).unwrap(),
                r#"{"stat_prefix":"mysql","cluster":"outbound|3306||mysql","idle_timeout":"1m 30s"}"#
            );
        }

        #[test]
        fn weighted_clusters() {
            let envoy: EnvoyTcpProxy = from_yaml_str(
                "stat_prefix: db\nmax_connect_attempts: 2\nweighted_clusters: {clusters: [{name: a, weight: 1}, {name: b, weight: 3}]}",
            )
            .unwrap();
            let json = serde_json::to_value(TcpProxy::try_from(envoy).unwrap()).unwrap();
            assert_eq!(
                json,
                serde_json::json!({
                    "stat_prefix": "db",
                    "weighted_clusters": [{"name": "a", "weight": 1}, {"name": "b", "weight": 3}],
                    "max_connect_attempts": 2
                })
            );
        }

        #[test]
        fn cluster_is_required() {
            let envoy: EnvoyTcpProxy = from_yaml_str("stat_prefix: db").unwrap();
            assert!(matches!(TcpProxy::try_from(envoy).unwrap_err(), GenericError::MissingField("cluster_specifier")));
        }
    }
}
