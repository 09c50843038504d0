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

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessLog {
    pub log_path: CompactString,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub log_format: CompactString,
}

#[cfg(feature = "envoy-conversions")]
pub(crate) mod envoy_conversions {
    use super::AccessLog;
    use crate::config::{common::*, opaque::lookup_str};
    use compact_str::CompactString;
    use mosn_data_plane_api::envoy_v2_api::{
        envoy::config::{
            accesslog::v2::FileAccessLog as EnvoyFileAccessLog,
            filter::accesslog::v2::{access_log::ConfigType, AccessLog as EnvoyAccessLog},
        },
    };
    use prost::{Message, Name};
    use tracing::debug;

    fn convert_access_log(envoy: EnvoyAccessLog) -> Result<Option<AccessLog>, GenericError> {
        let EnvoyAccessLog { name, config_type } = envoy;
        let (path, format): (CompactString, CompactString) = match config_type {
            Some(ConfigType::Config(config)) => (
                lookup_str(&config, "path").unwrap_or_default().into(),
                lookup_str(&config, "format").unwrap_or_default().into(),
            ),
            Some(ConfigType::TypedConfig(any)) if any.type_url == EnvoyFileAccessLog::type_url() => {
                let EnvoyFileAccessLog { path, format } = EnvoyFileAccessLog::decode(any.value.as_slice())
                    .map_err(|e| GenericError::from_msg_with_cause("failed to decode FileAccessLog", e))
                    .with_node("typed_config")?;
                (path.into(), format.into())
            },
            Some(ConfigType::TypedConfig(any)) => {
                debug!("access log {name} of type {} has no file path", any.type_url);
                return Ok(None);
            },
            None => (CompactString::default(), CompactString::default()),
        };
        if path.is_empty() {
            debug!("access log {name} has no path, skipping");
            return Ok(None);
        }
        Ok(Some(AccessLog { log_path: path, log_format: format }))
    }

    /// File access logs of a connection manager. Entries without a path are left out.
    pub fn convert_access_logs(access_log: Vec<EnvoyAccessLog>) -> Result<Vec<AccessLog>, GenericError> {
        let mut logs = Vec::with_capacity(access_log.len());
        for (index, entry) in access_log.into_iter().enumerate() {
            if let Some(log) = convert_access_log(entry).with_index(index).with_node("access_log")? {
                logs.push(log);
            }
        }
        Ok(logs)
    }

}
