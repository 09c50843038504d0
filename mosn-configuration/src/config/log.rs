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
use mosn_error::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<CompactString>,
    /// Logs go to stdout unless a directory is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<CompactString>,
}

impl LogConfig {
    pub const DEFAULT_LOG_FILE: &'static str = "mosn.log";

    fn directive(&self, from_env: Option<String>) -> CompactString {
        match from_env {
            Some(directive) if !directive.is_empty() => directive.into(),
            _ => self.log_level.clone().unwrap_or_else(|| DEFAULT_LOG_LEVEL.into()),
        }
    }

    /// The filter from `RUST_LOG`, else the configured level, else `info`.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let directive = self.directive(std::env::var(EnvFilter::DEFAULT_ENV).ok());
        EnvFilter::try_new(directive.as_str()).with_context(|| format!("invalid log filter \"{directive}\""))
    }

    pub fn log_file(&self) -> &str {
        self.log_file.as_deref().unwrap_or(Self::DEFAULT_LOG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_precedence() {
        let config = LogConfig::default();
        assert_eq!(config.directive(None), "info");
        let config = LogConfig { log_level: Some("debug".into()), ..Default::default() };
        assert_eq!(config.directive(None), "debug");
        assert_eq!(config.directive(Some(String::new())), "debug");
        assert_eq!(config.directive(Some("mosn=trace".into())), "mosn=trace");
        assert_eq!(config.log_file(), "mosn.log");
    }

    #[test]
    fn parses_from_yaml() {
        let config: LogConfig = serde_yaml::from_str("log_level: warn\nlog_directory: /var/log/mosn").unwrap();
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert_eq!(config.log_directory, Some(PathBuf::from("/var/log/mosn")));
    }
}
