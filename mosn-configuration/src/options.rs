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

use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mosn", author, version, about = "Translates Envoy v2 xDS resources into mosn configuration")]
pub struct Options {
    /// Process configuration file (YAML)
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,
    /// Address of the admin API, overrides `admin.address`
    #[arg(long, value_name = "ADDR")]
    pub admin_address: Option<String>,
    /// Log level or filter directive, overrides `logging.log_level`
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub dump: bool,
}

impl Options {
    pub fn parse_options() -> Self {
        Self::parse()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self { config: path.as_ref().to_path_buf(), ..Default::default() }
    }
}
