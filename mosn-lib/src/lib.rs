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

pub mod admin;
mod config_store;

pub use admin::{spawn_admin_server, CONFIG_DUMP_PATH};
pub use config_store::{ConfigStore, ORIGINAL_CONFIG_KEY};

pub type Error = mosn_error::Error;
pub type Result<T> = ::core::result::Result<T, Error>;
