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

pub mod access_log;
pub mod cluster;
pub mod common;
pub mod core;
pub mod listener;
pub mod log;
pub mod network_filters;
pub mod opaque;
pub mod snapshot;
pub mod transport;

pub use cluster::{Cluster, Host};
pub use common::GenericError;
pub use listener::Listener;
pub use log::LogConfig;
pub use network_filters::http_connection_manager::{header_matcher::HeaderMatcher, route::RouterConfiguration};
pub use snapshot::Snapshot;

#[cfg(feature = "envoy-conversions")]
pub use self::{
    cluster::envoy_conversions::{convert_endpoints_config, convert_load_assignment},
    listener::envoy_conversions::{convert_listener, convert_listener_config},
    network_filters::http_connection_manager::header_matcher::envoy_conversions::convert_headers,
};

use crate::options::Options;
use compact_str::CompactString;
use mosn_error::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs::File, path::Path};

pub const DEFAULT_ADMIN_ADDRESS: &str = ":8888";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub address: CompactString,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { address: DEFAULT_ADMIN_ADDRESS.into() }
    }
}

/// The process configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LogConfig,
    pub admin: AdminConfig,
    #[cfg(feature = "envoy-conversions")]
    #[serde(deserialize_with = "mosn_data_plane_api::decode::message")]
    pub static_resources: mosn_data_plane_api::DiscoverySnapshot,
    /// The file as it was read, kept for the configuration dump.
    #[serde(skip)]
    pub original: serde_json::Value,
}

impl Config {
    pub fn new(opt: &Options) -> Result<Self> {
        let original: serde_json::Value = deserialize_yaml(&opt.config)?;
        let mut config = Self::from_value(original)
            .with_context(|| format!("failed to parse configuration file {}", opt.config.display()))?;
        config.apply_options(opt);
        Ok(config)
    }

    pub fn from_value(original: serde_json::Value) -> Result<Self> {
        let mut config: Config = serde_path_to_error::deserialize(&original)?;
        config.original = original;
        Ok(config)
    }

    fn apply_options(&mut self, opt: &Options) {
        if let Some(address) = &opt.admin_address {
            self.admin.address = address.into();
        }
        if let Some(level) = &opt.log_level {
            self.logging.log_level = Some(level.into());
        }
    }

    #[cfg(feature = "envoy-conversions")]
    pub fn snapshot(&self) -> std::result::Result<Snapshot, GenericError> {
        Snapshot::try_from(self.static_resources.clone())
    }
}

pub fn deserialize_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context_msg(format!("failed to open {}", path.display()))?;
    serde_path_to_error::deserialize(serde_yaml::Deserializer::from_reader(file))
        .with_context_msg(format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosn_error::Error;

    const CONFIG: &str = r#"
logging:
  log_level: debug
admin:
  address: "127.0.0.1:9999"
static_resources:
  clusters:
  - name: backend
    type: STATIC
    hosts: [{socket_address: {address: 10.0.0.1, port_value: 8080}}]
"#;

    fn from_yaml(yaml: &str) -> Result<Config> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Config::from_value(value)
    }

    #[test]
    fn defaults() -> std::result::Result<(), Error> {
        let config = from_yaml("{}").with_context_msg("empty config")?;
        assert_eq!(config.admin.address, ":8888");
        assert_eq!(config.logging, LogConfig::default());
        assert_eq!(config.static_resources, mosn_data_plane_api::DiscoverySnapshot::default());
        Ok(())
    }

    #[test]
    fn keeps_the_original_document() -> std::result::Result<(), Error> {
        let config = from_yaml(CONFIG).with_context_msg("config")?;
        assert_eq!(config.admin.address, "127.0.0.1:9999");
        assert_eq!(config.original["logging"]["log_level"], "debug");
        let snapshot = config.snapshot()?;
        assert_eq!(snapshot.clusters[0].hosts[0].address, "10.0.0.1:8080");
        Ok(())
    }

    #[test]
    fn options_override_the_file() -> std::result::Result<(), Error> {
        let mut config = from_yaml(CONFIG).with_context_msg("config")?;
        let opt = Options {
            admin_address: Some(":7777".into()),
            log_level: Some("trace".into()),
            ..Options::from_path("mosn.yaml")
        };
        config.apply_options(&opt);
        assert_eq!(config.admin.address, ":7777");
        assert_eq!(config.logging.log_level.as_deref(), Some("trace"));
        Ok(())
    }

    #[test]
    fn parse_errors_name_the_field() {
        let err = from_yaml("admin:\n  address: [1]\n").unwrap_err();
        assert!(err.to_string().starts_with("admin.address"), "{err}");
    }

    #[test]
    fn missing_file() {
        let err = Config::new(&Options::from_path("/nonexistent/mosn.yaml")).unwrap_err();
        assert!(err.to_string().starts_with("failed to open /nonexistent/mosn.yaml"), "{err}");
    }
}
