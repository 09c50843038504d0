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

use super::{access_log::AccessLog, network_filters::Filter, transport::TlsConfig};
use compact_str::CompactString;
use serde::Serialize;

/// The mosn listener, field order follows the runtime's configuration file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listener {
    pub name: CompactString,
    pub address: CompactString,
    pub bind_port: bool,
    pub handoff_restoreddestination: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_conn_buffer_limit_bytes: Option<u32>,
    pub log_path: CompactString,
    pub access_logs: Vec<AccessLog>,
    pub filter_chains: Vec<FilterChain>,
    pub inspector: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterChain {
    #[serde(rename = "match")]
    pub filter_chain_match: Option<FilterChainMatch>,
    pub tls_context: TlsConfig,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterChainMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prefix_ranges: Vec<CompactString>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub server_names: Vec<CompactString>,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub transport_protocol: CompactString,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub application_protocols: Vec<CompactString>,
}

pub const DEFAULT_LOG_PATH: &str = "stdout";

#[cfg(feature = "envoy-conversions")]
pub(crate) mod envoy_conversions {
    use super::{FilterChain, FilterChainMatch, Listener, DEFAULT_LOG_PATH};
    use crate::config::{
        access_log::AccessLog,
        common::*,
        core::envoy_conversions::address_to_string,
        network_filters::{
            envoy_conversions::{SupportedEnvoyFilter, SupportedEnvoyNetworkFilter},
            http_connection_manager::HttpConnectionManager,
            tcp_proxy::TcpProxy,
            Filter,
        },
        transport::TlsConfig,
    };
    use compact_str::{format_compact, CompactString};
    use mosn_data_plane_api::envoy_v2_api::envoy::{
        api::v2::{
            core::{Address as EnvoyAddress, CidrRange},
            listener::{
                DeprecatedV1, Filter as EnvoyFilter, FilterChain as EnvoyFilterChain,
                FilterChainMatch as EnvoyFilterChainMatch, ListenerFilter as EnvoyListenerFilter,
            },
            Listener as EnvoyListener,
        },
        config::filter::network::http_connection_manager::v2::HttpConnectionManager as EnvoyHttpConnectionManager,
    };
    use tracing::info;

    fn cidr_to_string(cidr: CidrRange) -> Result<CompactString, GenericError> {
        let CidrRange { address_prefix, prefix_len } = cidr;
        let address_prefix = required!(address_prefix)?;
        let prefix_len = prefix_len.unwrap_or(if address_prefix.contains(':') { 128 } else { 32 });
        Ok(format_compact!("{address_prefix}/{prefix_len}"))
    }

    impl TryFrom<EnvoyFilterChainMatch> for FilterChainMatch {
        type Error = GenericError;
        fn try_from(envoy: EnvoyFilterChainMatch) -> Result<Self, Self::Error> {
            let EnvoyFilterChainMatch {
                destination_port,
                prefix_ranges,
                source_prefix_ranges,
                source_ports,
                server_names,
                transport_protocol,
                application_protocols,
            } = envoy;
            unsupported_field!(source_prefix_ranges, source_ports)?;
            let prefix_ranges = prefix_ranges
                .into_iter()
                .enumerate()
                .map(|(index, cidr)| cidr_to_string(cidr).with_index(index))
                .collect::<Result<Vec<_>, _>>()
                .with_node("prefix_ranges")?;
            Ok(Self {
                destination_port,
                prefix_ranges,
                server_names: server_names.into_iter().map(CompactString::from).collect(),
                transport_protocol: transport_protocol.into(),
                application_protocols: application_protocols.into_iter().map(CompactString::from).collect(),
            })
        }
    }

    /// State shared by the filter chains of one listener.
    struct ListenerBuilder<'a> {
        routing_filter: Option<(&'a str, &'a EnvoyHttpConnectionManager)>,
        access_logs: Vec<AccessLog>,
    }

    impl ListenerBuilder<'_> {
        fn convert_filter(&mut self, envoy: EnvoyFilter) -> Result<Option<Filter>, GenericError> {
            let SupportedEnvoyNetworkFilter { name, filter } = match self.routing_filter {
                Some((routing_name, hcm)) if envoy.name == routing_name => SupportedEnvoyNetworkFilter {
                    name: envoy.name.into(),
                    filter: SupportedEnvoyFilter::HttpConnectionManager(hcm.clone()),
                },
                _ => SupportedEnvoyNetworkFilter::try_from(envoy)?,
            };
            match filter {
                SupportedEnvoyFilter::HttpConnectionManager(hcm) => {
                    let HttpConnectionManager { proxy, access_logs } =
                        HttpConnectionManager::try_from(hcm).with_name(name)?;
                    self.access_logs.extend(access_logs);
                    Ok(Some(Filter::Proxy(proxy)))
                },
                SupportedEnvoyFilter::TcpProxy(tcp_proxy) => {
                    TcpProxy::try_from(tcp_proxy).map(|proxy| Some(Filter::TcpProxy(proxy))).with_name(name)
                },
                SupportedEnvoyFilter::Ignored => Ok(None),
            }
        }

        fn convert_filter_chain(&mut self, envoy: EnvoyFilterChain) -> Result<FilterChain, GenericError> {
            let EnvoyFilterChain { filter_chain_match, tls_context, filters, use_proxy_proto, metadata: _, name: _ } =
                envoy;
            unsupported_field!(use_proxy_proto)?;
            let filter_chain_match =
                filter_chain_match.map(FilterChainMatch::try_from).transpose().with_node("filter_chain_match")?;
            let tls_context = match tls_context {
                Some(tls_context) => TlsConfig::try_from(tls_context).with_node("tls_context")?,
                None => TlsConfig::disabled(),
            };
            let mut converted = Vec::with_capacity(filters.len());
            for (index, filter) in filters.into_iter().enumerate() {
                if let Some(filter) = self.convert_filter(filter).with_index(index).with_node("filters")? {
                    converted.push(filter);
                }
            }
            Ok(FilterChain { filter_chain_match, tls_context, filters: converted })
        }

        fn build(mut self, envoy: EnvoyListener, address: Option<EnvoyAddress>) -> Result<Listener, GenericError> {
            let EnvoyListener {
                name,
                address: listener_address,
                filter_chains,
                use_original_dst,
                per_connection_buffer_limit_bytes,
                metadata: _,
                deprecated_v1,
                drain_type: _,
                listener_filters,
                transparent,
                freebind,
            } = envoy;
            let name: CompactString = name.into();
            (|| -> Result<_, GenericError> {
                unsupported_field!(transparent, freebind)?;
                for EnvoyListenerFilter { name, .. } in &listener_filters {
                    info!("Ignored listener filter {name}");
                }
                let address = match address.or(listener_address) {
                    Some(address) => address_to_string(address).with_node("address")?,
                    None => return Err(GenericError::MissingField("address")),
                };
                let bind_port = deprecated_v1.and_then(|DeprecatedV1 { bind_to_port }| bind_to_port).unwrap_or(false);
                let filter_chains = filter_chains
                    .into_iter()
                    .enumerate()
                    .map(|(index, chain)| self.convert_filter_chain(chain).with_index(index))
                    .collect::<Result<Vec<_>, _>>()
                    .with_node("filter_chains")?;
                Ok(Listener {
                    name: name.clone(),
                    address,
                    bind_port,
                    handoff_restoreddestination: use_original_dst.unwrap_or_default(),
                    per_conn_buffer_limit_bytes: per_connection_buffer_limit_bytes,
                    log_path: DEFAULT_LOG_PATH.into(),
                    access_logs: std::mem::take(&mut self.access_logs),
                    filter_chains,
                    inspector: true,
                })
            })()
            .with_name(name.clone())
        }
    }

    impl TryFrom<EnvoyListener> for Listener {
        type Error = GenericError;
        fn try_from(envoy: EnvoyListener) -> Result<Self, Self::Error> {
            ListenerBuilder { routing_filter: None, access_logs: Vec::new() }.build(envoy, None)
        }
    }

    /// Translates a listener whose routing filter configuration was resolved by the caller.
    ///
    /// The filter named `filter_name` in every chain is replaced by `hcm`, and `address` takes
    /// precedence over the listener's own address.
    pub fn convert_listener(
        listener: EnvoyListener,
        address: EnvoyAddress,
        filter_name: &str,
        hcm: &EnvoyHttpConnectionManager,
    ) -> Result<Listener, GenericError> {
        ListenerBuilder { routing_filter: Some((filter_name, hcm)), access_logs: Vec::new() }
            .build(listener, Some(address))
    }

    /// Translates a listener, decoding each filter from its own configuration.
    pub fn convert_listener_config(listener: EnvoyListener) -> Result<Listener, GenericError> {
        Listener::try_from(listener)
    }

}
