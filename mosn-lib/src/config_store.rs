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
use mosn_configuration::config::{Config, Snapshot};
use mosn_error::Context;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::Result;

/// The key the full process configuration is merged under.
pub const ORIGINAL_CONFIG_KEY: &str = "original_config";

const RESERVED_KEYS: [&str; 3] = ["listeners", "clusters", "routers"];

#[derive(Debug, Default)]
struct StoreInner {
    snapshot: Snapshot,
    extras: BTreeMap<CompactString, serde_json::Value>,
}

/// The effective configuration of the process.
///
/// Populated once at startup and read by the admin API afterwards.
#[derive(Debug, Default)]
pub struct ConfigStore {
    inner: RwLock<StoreInner>,
}

impl ConfigStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { inner: RwLock::new(StoreInner { snapshot, extras: BTreeMap::new() }) }
    }

    /// Translates the static resources of `config` and merges the file itself.
    pub fn from_config(config: &Config) -> Result<Self> {
        let snapshot = config.snapshot().context("failed to translate static resources")?;
        debug!(
            "translated {} listeners, {} clusters and {} route configurations",
            snapshot.listeners.len(),
            snapshot.clusters.len(),
            snapshot.routers.len()
        );
        let store = Self::new(snapshot);
        store.merge(ORIGINAL_CONFIG_KEY, config.original.clone());
        Ok(store)
    }

    pub fn set_snapshot(&self, snapshot: Snapshot) {
        self.inner.write().snapshot = snapshot;
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().snapshot.clone()
    }

    /// Adds a generic entry to the dump. Keys used by the translated snapshot are refused.
    pub fn merge<K: Into<CompactString>>(&self, key: K, value: serde_json::Value) {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            warn!("config store key {key} is reserved, entry ignored");
            return;
        }
        if self.inner.write().extras.insert(key.clone(), value).is_some() {
            debug!("config store entry {key} replaced");
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.read().extras.get(key).cloned()
    }
}

#[derive(Serialize)]
struct ConfigDump<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    #[serde(flatten)]
    extras: &'a BTreeMap<CompactString, serde_json::Value>,
}

impl Serialize for ConfigStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let inner = self.inner.read();
        ConfigDump { snapshot: &inner.snapshot, extras: &inner.extras }.serialize(serializer)
    }
}
