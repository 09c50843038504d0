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

use super::{core::Metadata, transport::TlsConfig};
use compact_str::CompactString;
use serde::Serialize;
use std::time::Duration;

/// Host weights the load balancer accepts.
pub const MIN_HOST_WEIGHT: u32 = 1;
pub const MAX_HOST_WEIGHT: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub address: CompactString,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub hostname: CompactString,
    pub weight: u32,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterType {
    Simple,
    Eds,
    OriginalDst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LbType {
    #[serde(rename = "LB_ROUNDROBIN")]
    RoundRobin,
    #[serde(rename = "LB_RANDOM")]
    Random,
    #[serde(rename = "LB_LEAST_REQUEST")]
    LeastRequest,
    #[serde(rename = "LB_ORIGINAL_DST")]
    OriginalDst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Default,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    pub priority: Priority,
    pub max_connections: u32,
    pub max_pending_requests: u32,
    pub max_requests: u32,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CircuitBreakers {
    pub thresholds: Vec<Thresholds>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub name: CompactString,
    #[serde(rename = "type")]
    pub cluster_type: ClusterType,
    pub lb_type: LbType,
    pub max_request_per_conn: u32,
    pub conn_buffer_limit_bytes: u32,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    pub circuit_breakers: CircuitBreakers,
    pub tls_context: TlsConfig,
    pub hosts: Vec<Host>,
    /// The name endpoint assignments for this cluster are published under.
    #[serde(skip)]
    pub service_name: CompactString,
}

impl Cluster {
    pub fn assignment_name(&self) -> &str {
        if self.service_name.is_empty() {
            &self.name
        } else {
            &self.service_name
        }
    }
}

#[cfg(feature = "envoy-conversions")]
pub(crate) mod envoy_conversions {
    use super::{
        CircuitBreakers, Cluster, ClusterType, Host, LbType, Priority, Thresholds, MAX_HOST_WEIGHT, MIN_HOST_WEIGHT,
    };
    use crate::config::{
        common::*,
        core::envoy_conversions::{address_to_string, convert_duration, convert_metadata},
        transport::TlsConfig,
    };
    use compact_str::CompactString;
    use mosn_data_plane_api::envoy_v2_api::envoy::api::v2::{
        circuit_breakers::Thresholds as EnvoyThresholds,
        cluster::{DiscoveryType, EdsClusterConfig, LbPolicy},
        core::RoutingPriority,
        endpoint::{Endpoint as EnvoyEndpoint, LbEndpoint as EnvoyLbEndpoint, LocalityLbEndpoints},
        CircuitBreakers as EnvoyCircuitBreakers, Cluster as EnvoyCluster, ClusterLoadAssignment,
    };
    use std::time::Duration;
    use tracing::warn;

    /// Connect timeout applied when the cluster leaves it unset.
    const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    fn clamp_weight(weight: Option<u32>) -> u32 {
        let Some(weight) = weight else {
            return MIN_HOST_WEIGHT;
        };
        let clamped = weight.clamp(MIN_HOST_WEIGHT, MAX_HOST_WEIGHT);
        if clamped != weight {
            warn!("host weight {weight} is out of range [{MIN_HOST_WEIGHT}, {MAX_HOST_WEIGHT}], using {clamped}");
        }
        clamped
    }

    impl TryFrom<EnvoyLbEndpoint> for Host {
        type Error = GenericError;
        fn try_from(envoy: EnvoyLbEndpoint) -> Result<Self, Self::Error> {
            let EnvoyLbEndpoint { endpoint, health_status: _, metadata, load_balancing_weight } = envoy;
            let EnvoyEndpoint { address, hostname } = required!(endpoint)?;
            let address = address_to_string(required!(address)?).with_node("address").with_node("endpoint")?;
            Ok(Self {
                address,
                hostname: hostname.into(),
                weight: clamp_weight(load_balancing_weight),
                metadata: convert_metadata(metadata),
            })
        }
    }

    /// One host per endpoint of the group, in order. A group without endpoints gives no hosts.
    pub fn convert_endpoints_config(endpoints: &LocalityLbEndpoints) -> Result<Vec<Host>, GenericError> {
        let lb_endpoints = endpoints.lb_endpoints.clone();
        convert_vec!(lb_endpoints)
    }

    /// Flattens every locality of an assignment into one host list.
    pub fn convert_load_assignment(assignment: &ClusterLoadAssignment) -> Result<Vec<Host>, GenericError> {
        let mut hosts = Vec::new();
        for (index, endpoints) in assignment.endpoints.iter().enumerate() {
            hosts.extend(convert_endpoints_config(endpoints).with_index(index).with_node("endpoints")?);
        }
        Ok(hosts)
    }

    impl From<EnvoyThresholds> for Thresholds {
        fn from(envoy: EnvoyThresholds) -> Self {
            let priority = match envoy.priority() {
                RoutingPriority::Default => Priority::Default,
                RoutingPriority::High => Priority::High,
            };
            let EnvoyThresholds { priority: _, max_connections, max_pending_requests, max_requests, max_retries } =
                envoy;
            Self {
                priority,
                max_connections: max_connections.unwrap_or(1024),
                max_pending_requests: max_pending_requests.unwrap_or(1024),
                max_requests: max_requests.unwrap_or(1024),
                max_retries: max_retries.unwrap_or(3),
            }
        }
    }

    impl From<EnvoyCircuitBreakers> for CircuitBreakers {
        fn from(envoy: EnvoyCircuitBreakers) -> Self {
            Self { thresholds: envoy.thresholds.into_iter().map(Thresholds::from).collect() }
        }
    }

    impl TryFrom<LbPolicy> for LbType {
        type Error = GenericError;
        fn try_from(policy: LbPolicy) -> Result<Self, Self::Error> {
            match policy {
                LbPolicy::RoundRobin => Ok(Self::RoundRobin),
                LbPolicy::Random => Ok(Self::Random),
                LbPolicy::LeastRequest => Ok(Self::LeastRequest),
                LbPolicy::OriginalDstLb => Ok(Self::OriginalDst),
                other => Err(GenericError::unsupported_variant(other.as_str_name())),
            }
        }
    }

    impl From<DiscoveryType> for ClusterType {
        fn from(value: DiscoveryType) -> Self {
            match value {
                DiscoveryType::Static | DiscoveryType::StrictDns | DiscoveryType::LogicalDns => Self::Simple,
                DiscoveryType::Eds => Self::Eds,
                DiscoveryType::OriginalDst => Self::OriginalDst,
            }
        }
    }

    impl TryFrom<EnvoyCluster> for Cluster {
        type Error = GenericError;
        fn try_from(envoy: EnvoyCluster) -> Result<Self, Self::Error> {
            let cluster_type = ClusterType::from(envoy.r#type());
            let lb_policy = envoy.lb_policy();
            let EnvoyCluster {
                name,
                alt_stat_name: _,
                r#type: _,
                eds_cluster_config,
                connect_timeout,
                per_connection_buffer_limit_bytes,
                lb_policy: _,
                hosts,
                load_assignment,
                max_requests_per_connection,
                circuit_breakers,
                tls_context,
            } = envoy;
            let name: CompactString = required!(name)?.into();
            (|| -> Result<_, GenericError> {
                let lb_type = LbType::try_from(lb_policy).with_node("lb_policy")?;
                let mut converted = match &load_assignment {
                    Some(assignment) => convert_load_assignment(assignment).with_node("load_assignment")?,
                    None => Vec::new(),
                };
                for (index, address) in hosts.into_iter().enumerate() {
                    let address = address_to_string(address).with_index(index).with_node("hosts")?;
                    converted.push(Host {
                        address,
                        hostname: CompactString::default(),
                        weight: MIN_HOST_WEIGHT,
                        metadata: Default::default(),
                    });
                }
                let tls_context = match tls_context {
                    Some(tls_context) => TlsConfig::try_from(tls_context).with_node("tls_context")?,
                    None => TlsConfig::disabled(),
                };
                let service_name = eds_cluster_config
                    .map(|EdsClusterConfig { service_name, .. }| CompactString::from(service_name))
                    .unwrap_or_default();
                Ok(Cluster {
                    name: name.clone(),
                    cluster_type,
                    lb_type,
                    max_request_per_conn: max_requests_per_connection.unwrap_or_default(),
                    conn_buffer_limit_bytes: per_connection_buffer_limit_bytes.unwrap_or_default(),
                    connect_timeout: connect_timeout.map_or(DEFAULT_CONNECT_TIMEOUT, convert_duration),
                    circuit_breakers: circuit_breakers.map(CircuitBreakers::from).unwrap_or_default(),
                    tls_context,
                    hosts: converted,
                    service_name,
                })
            })()
            .with_name(name.clone())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use mosn_data_plane_api::decode::from_yaml_str;
        use tracing_test::traced_test;

        #[test]
        fn endpoints_without_hosts() {
            let group = LocalityLbEndpoints { priority: 1, ..Default::default() };
            let hosts = convert_endpoints_config(&group).unwrap();
            assert!(hosts.is_empty());
            assert_eq!(serde_json::to_string(&hosts).unwrap(), "[]");
        }

        #[traced_test]
        #[test]
        fn endpoint_weights() {
            let group: LocalityLbEndpoints = from_yaml_str(
                r#"
lb_endpoints:
- endpoint: {address: {socket_address: {address: 10.0.0.1, port_value: 9080}}}
- endpoint: {address: {socket_address: {address: 10.0.0.2, port_value: 9080}}, hostname: reviews-v2}
  load_balancing_weight: 500
  metadata: {filter_metadata: {envoy.lb: {version: v2}}}
- endpoint: {address: {socket_address: {address: 10.0.0.3, port_value: 9080}}}
  load_balancing_weight: 0
"#,
            )
            .unwrap();
            let hosts = convert_endpoints_config(&group).unwrap();
            let summary: Vec<_> = hosts.iter().map(|h| (h.address.as_str(), h.weight)).collect();
            assert_eq!(summary, vec![("10.0.0.1:9080", 1), ("10.0.0.2:9080", 128), ("10.0.0.3:9080", 1)]);
            assert_eq!(
                serde_json::to_value(&hosts[1]).unwrap(),
                serde_json::json!({
                    "address": "10.0.0.2:9080",
                    "hostname": "reviews-v2",
                    "weight": 128,
                    "metadata": {"filter_metadata": {"mosn.lb": {"version": "v2"}}}
                })
            );
            assert!(logs_contain("host weight 500 is out of range"));
        }

        #[test]
        fn endpoint_without_address() {
            let group: LocalityLbEndpoints = from_yaml_str("lb_endpoints: [{endpoint: {hostname: h}}]").unwrap();
            let err = convert_endpoints_config(&group).unwrap_err();
            assert!(matches!(err.root(), GenericError::MissingField("address")));
            assert_eq!(err.path().as_deref(), Some("lb_endpoints[0]"));
        }

        #[test]
        fn static_cluster() {
            let cluster: EnvoyCluster = from_yaml_str(
                r#"
name: "outbound|9080||reviews"
type: STRICT_DNS
connect_timeout: 0.25s
lb_policy: LEAST_REQUEST
max_requests_per_connection: 64
circuit_breakers: {thresholds: [{max_connections: 100}, {priority: HIGH, max_retries: 5}]}
tls_context: {sni: reviews.default.svc}
hosts: [{socket_address: {address: reviews, port_value: 9080}}]
load_assignment:
  cluster_name: reviews
  endpoints: [{lb_endpoints: [{endpoint: {address: {socket_address: {address: 10.0.0.1, port_value: 9080}}}}]}]
"#,
            )
            .unwrap();
            let cluster = Cluster::try_from(cluster).unwrap();
            let json = serde_json::to_value(&cluster).unwrap();
            assert_eq!(json["type"], "SIMPLE");
            assert_eq!(json["lb_type"], "LB_LEAST_REQUEST");
            assert_eq!(json["connect_timeout"], "250ms");
            assert_eq!(json["max_request_per_conn"], 64);
            assert_eq!(
                json["circuit_breakers"]["thresholds"],
                serde_json::json!([
                    {"priority": "DEFAULT", "max_connections": 100, "max_pending_requests": 1024, "max_requests": 1024, "max_retries": 3},
                    {"priority": "HIGH", "max_connections": 1024, "max_pending_requests": 1024, "max_requests": 1024, "max_retries": 5}
                ])
            );
            assert_eq!(json["tls_context"]["server_name"], "reviews.default.svc");
            let addresses: Vec<_> = cluster.hosts.iter().map(|h| h.address.as_str()).collect();
            assert_eq!(addresses, vec!["10.0.0.1:9080", "reviews:9080"]);
            assert!(json.get("service_name").is_none());
        }

        #[test]
        fn eds_cluster_defaults() {
            let cluster: EnvoyCluster = from_yaml_str(
                "name: reviews\ntype: EDS\neds_cluster_config: {service_name: \"outbound|9080||reviews\", eds_config: {ads: {}}}",
            )
            .unwrap();
            let cluster = Cluster::try_from(cluster).unwrap();
            assert_eq!(cluster.cluster_type, ClusterType::Eds);
            assert_eq!(cluster.lb_type, LbType::RoundRobin);
            assert_eq!(cluster.connect_timeout, Duration::from_secs(5));
            assert_eq!(cluster.assignment_name(), "outbound|9080||reviews");
            assert!(cluster.hosts.is_empty());
            assert!(!cluster.tls_context.status);
        }

        #[test]
        fn unsupported_lb_policy() {
            let cluster: EnvoyCluster = from_yaml_str("name: c\nlb_policy: MAGLEV").unwrap();
            assert_eq!(
                Cluster::try_from(cluster).unwrap_err().to_string(),
                "(\"c\").lb_policy: unsupported variant: MAGLEV"
            );
        }
    }
}
