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

pub mod logging;
mod proxy;
pub mod signal;

use mosn_configuration::{config::Config, options::Options};
use mosn_error::{Context, Result};
use mosn_lib::ConfigStore;
use std::{io::Write, sync::Arc};
use tracing::info;

pub use proxy::run_proxy;

pub fn run() -> Result<()> {
    let options = Options::parse_options();
    let config = Config::new(&options)?;
    let console = if options.dump { logging::Console::Stderr } else { logging::Console::Stdout };
    let _guard = logging::init(&config.logging, console)?;
    info!("Loaded configuration from {}", options.config.display());

    let store = ConfigStore::from_config(&config)?;
    if options.dump {
        return write_dump(&store, std::io::stdout().lock());
    }
    run_proxy(&config.admin.address, Arc::new(store))
}

fn write_dump<W: Write>(store: &ConfigStore, mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, store).context("failed to dump configuration")?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosn_error::Error;

    #[test]
    fn dump_is_pretty_json() -> std::result::Result<(), Error> {
        let original = serde_json::json!({"static_resources": {"clusters": [
            {"name": "backend", "type": "STATIC", "hosts": [{"socket_address": {"address": "10.0.0.1", "port_value": 80}}]}
        ]}});
        let config = Config::from_value(original)?;
        let store = ConfigStore::from_config(&config)?;
        let mut out = Vec::new();
        write_dump(&store, &mut out)?;
        let text = String::from_utf8(out)?;
        assert!(text.ends_with("}\n"));
        let dump: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(dump["clusters"][0]["hosts"][0]["address"], "10.0.0.1:80");
        assert_eq!(dump["original_config"]["static_resources"]["clusters"][0]["name"], "backend");
        Ok(())
    }
}
