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

pub mod http_connection_manager;
pub mod tcp_proxy;

use http_connection_manager::ProxyConfig;
use serde::Serialize;
use tcp_proxy::TcpProxy;

/// A network filter of a listener filter chain, serialized as `{"type": .., "config": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum Filter {
    Proxy(ProxyConfig),
    TcpProxy(TcpProxy),
}

#[cfg(feature = "envoy-conversions")]
pub(crate) mod envoy_conversions {
    use crate::config::{common::*, opaque::from_struct};
    use compact_str::CompactString;
    use mosn_data_plane_api::envoy_v2_api::{
        envoy::{
            api::v2::listener::{filter::ConfigType, Filter as EnvoyFilter},
            config::filter::network::{
                http_connection_manager::v2::HttpConnectionManager as EnvoyHttpConnectionManager,
                tcp_proxy::v2::TcpProxy as EnvoyTcpProxy,
            },
        },
        google::protobuf::{Any, Struct},
    };
    use prost::{Message, Name};
    use tracing::info;

    pub const HTTP_CONNECTION_MANAGER: &str = "envoy.http_connection_manager";
    const HTTP_CONNECTION_MANAGER_V3_NAME: &str = "envoy.filters.network.http_connection_manager";
    const TCP_PROXY: &str = "envoy.tcp_proxy";
    const TCP_PROXY_V3_NAME: &str = "envoy.filters.network.tcp_proxy";

    #[allow(clippy::large_enum_variant)]
    #[derive(Debug, Clone)]
    pub(crate) enum SupportedEnvoyFilter {
        HttpConnectionManager(EnvoyHttpConnectionManager),
        TcpProxy(EnvoyTcpProxy),
        Ignored,
    }

    impl SupportedEnvoyFilter {
        fn from_struct_config(name: &str, config: &Struct) -> Result<Self, GenericError> {
            match name {
                HTTP_CONNECTION_MANAGER | HTTP_CONNECTION_MANAGER_V3_NAME => {
                    from_struct(config).map(Self::HttpConnectionManager)
                },
                TCP_PROXY | TCP_PROXY_V3_NAME => from_struct(config).map(Self::TcpProxy),
                _ => {
                    info!("Ignored network filter {name}");
                    Ok(Self::Ignored)
                },
            }
        }
    }

    impl TryFrom<Any> for SupportedEnvoyFilter {
        type Error = GenericError;
        fn try_from(typed_config: Any) -> Result<Self, Self::Error> {
            match typed_config.type_url.as_str() {
                url if url == EnvoyHttpConnectionManager::type_url() => {
                    EnvoyHttpConnectionManager::decode(typed_config.value.as_slice()).map(Self::HttpConnectionManager)
                },
                url if url == EnvoyTcpProxy::type_url() => {
                    EnvoyTcpProxy::decode(typed_config.value.as_slice()).map(Self::TcpProxy)
                },
                _ => {
                    info!("Ignored network filter type {}", typed_config.type_url);
                    return Ok(Self::Ignored);
                },
            }
            .map_err(|e| {
                GenericError::from_msg_with_cause(
                    format!("failed to parse protobuf for \"{}\"", typed_config.type_url),
                    e,
                )
            })
        }
    }

    /// A listener filter decoded from whichever configuration form it carries.
    #[derive(Debug, Clone)]
    pub(crate) struct SupportedEnvoyNetworkFilter {
        pub name: CompactString,
        pub filter: SupportedEnvoyFilter,
    }

    impl TryFrom<EnvoyFilter> for SupportedEnvoyNetworkFilter {
        type Error = GenericError;
        fn try_from(envoy: EnvoyFilter) -> Result<Self, Self::Error> {
            let EnvoyFilter { name, config_type } = envoy;
            let name: CompactString = required!(name)?.into();
            let filter = match config_type {
                Some(ConfigType::Config(config)) => {
                    SupportedEnvoyFilter::from_struct_config(&name, &config).with_node("config")
                },
                Some(ConfigType::TypedConfig(any)) => SupportedEnvoyFilter::try_from(any).with_node("typed_config"),
                None => SupportedEnvoyFilter::from_struct_config(&name, &Struct::default()),
            }
            .with_name(name.clone())?;
            Ok(Self { name, filter })
        }
    }

}
