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

pub mod header_matcher;
pub mod route;

use super::super::access_log::AccessLog;
use compact_str::CompactString;
use route::VirtualHost;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Protocol {
    #[default]
    Http1,
    Http2,
}

/// The routing filter of an HTTP listener.
///
/// Routes come either inline through `virtual_hosts` or, when `router_config_name` is set, from
/// a route configuration delivered separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyConfig {
    pub downstream_protocol: Protocol,
    pub support_dynamic_route: bool,
    pub upstream_protocol: Protocol,
    pub validate_clusters: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_config_name: Option<CompactString>,
    pub virtual_hosts: Vec<VirtualHost>,
}

/// A translated connection manager: the proxy filter plus the access logs the listener owns.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConnectionManager {
    pub proxy: ProxyConfig,
    pub access_logs: Vec<AccessLog>,
}

#[cfg(feature = "envoy-conversions")]
mod envoy_conversions {
    use super::{route::RouterConfiguration, HttpConnectionManager, Protocol, ProxyConfig};
    use crate::config::{access_log::envoy_conversions::convert_access_logs, common::*};
    use mosn_data_plane_api::envoy_v2_api::envoy::config::filter::network::http_connection_manager::v2::{
        http_connection_manager::{CodecType, RouteSpecifier},
        HttpConnectionManager as EnvoyHttpConnectionManager, HttpFilter as EnvoyHttpFilter, Rds as EnvoyRds,
    };
    use tracing::debug;

    impl TryFrom<CodecType> for Protocol {
        type Error = GenericError;
        fn try_from(codec: CodecType) -> Result<Self, Self::Error> {
            match codec {
                CodecType::Auto | CodecType::Http1 => Ok(Self::Http1),
                CodecType::Http2 => Ok(Self::Http2),
                CodecType::Http3 => Err(GenericError::unsupported_variant("HTTP3")),
            }
        }
    }

    impl TryFrom<EnvoyHttpConnectionManager> for HttpConnectionManager {
        type Error = GenericError;
        fn try_from(envoy: EnvoyHttpConnectionManager) -> Result<Self, Self::Error> {
            let protocol = Protocol::try_from(envoy.codec_type()).with_node("codec_type")?;
            let EnvoyHttpConnectionManager {
                codec_type: _,
                stat_prefix: _,
                http_filters,
                add_user_agent: _,
                server_name: _,
                idle_timeout: _,
                stream_idle_timeout: _,
                request_timeout: _,
                drain_timeout: _,
                access_log,
                use_remote_address: _,
                xff_num_trusted_hops: _,
                skip_xff_append: _,
                via: _,
                generate_request_id: _,
                forward_client_cert_details: _,
                proxy_100_continue: _,
                represent_ipv4_remote_address_as_ipv4_mapped_ipv6: _,
                route_specifier,
            } = envoy;
            if !http_filters.is_empty() {
                let names: Vec<_> = http_filters.iter().map(|EnvoyHttpFilter { name, .. }| name.as_str()).collect();
                debug!("http filters {names:?} are not translated");
            }
            let access_logs = convert_access_logs(access_log)?;
            let (validate_clusters, router_config_name, virtual_hosts) = match required!(route_specifier)? {
                RouteSpecifier::RouteConfig(route_config) => {
                    let validate_clusters = route_config.validate_clusters.unwrap_or_default();
                    let RouterConfiguration { virtual_hosts, .. } =
                        RouterConfiguration::try_from(route_config).with_node("route_config")?;
                    (validate_clusters, None, virtual_hosts)
                },
                RouteSpecifier::Rds(EnvoyRds { config_source: _, route_config_name }) => {
                    let name = required!(route_config_name).with_node("rds")?;
                    (false, Some(name.into()), Vec::new())
                },
            };
            Ok(Self {
                proxy: ProxyConfig {
                    downstream_protocol: protocol,
                    support_dynamic_route: true,
                    upstream_protocol: protocol,
                    validate_clusters,
                    router_config_name,
                    virtual_hosts,
                },
                access_logs,
            })
        }
    }

}
