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

use mosn_configuration::{config::Config, options::Options};
use mosn_error::Error;
use mosn_lib::ConfigStore;
use tracing_test::traced_test;

fn check_config_file(file_path: &str) -> Result<serde_json::Value, Error> {
    // file_path is relative to crate root
    let config = Config::new(&Options::from_path(file_path))?;
    let store = ConfigStore::from_config(&config)?;
    Ok(serde_json::to_value(&store)?)
}

#[traced_test]
#[test]
fn demo_static() -> Result<(), Error> {
    let dump = check_config_file("conf/mosn.yaml")?;
    let listener = &dump["listeners"][0];
    assert_eq!(listener["address"], "0.0.0.0:80");
    assert_eq!(listener["access_logs"][0]["log_path"], "/dev/stdout");
    assert_eq!(dump["clusters"][0]["hosts"][0]["address"], "127.0.0.1:9080");
    assert_eq!(dump["original_config"]["admin"]["address"], ":8888");
    Ok(())
}

#[traced_test]
#[test]
fn demo_rds() -> Result<(), Error> {
    let dump = check_config_file("conf/mosn-rds.yaml")?;
    assert_eq!(dump["listeners"][0]["filter_chains"][0]["filters"][0]["config"]["router_config_name"], "9080");
    let router = &dump["routers"][0]["virtual_hosts"][0]["routers"][0];
    assert_eq!(router["redirect"]["host_redirect"], "reviews-v2");
    assert_eq!(router["redirect"]["response_code"], 302);
    assert_eq!(router["route"]["cluster_name"], "");
    assert_eq!(dump["clusters"][0]["hosts"][0]["address"], "10.0.0.1:9080");
    Ok(())
}

#[test]
fn cli_overrides_apply() -> Result<(), Error> {
    let options = Options {
        admin_address: Some(":9999".into()),
        log_level: Some("debug".into()),
        ..Options::from_path("conf/mosn.yaml")
    };
    let config = Config::new(&options)?;
    assert_eq!(config.admin.address, ":9999");
    assert_eq!(config.logging.log_level.as_deref(), Some("debug"));
    Ok(())
}

#[test]
fn missing_config_file() {
    let err = Config::new(&Options::from_path("conf/missing.yaml")).unwrap_err();
    assert!(err.to_string().contains("conf/missing.yaml"), "{err}");
}
