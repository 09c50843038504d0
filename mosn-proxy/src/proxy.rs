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

use crate::signal::{Shutdown, ShutdownSignal};
use mosn_error::{Context, Result};
use mosn_lib::{spawn_admin_server, ConfigStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Serves the admin API until a shutdown signal arrives.
pub fn run_proxy(admin_address: &str, store: Arc<ConfigStore>) -> Result<()> {
    debug!("Starting on thread {:?}", std::thread::current().name());
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("mosn-worker")
        .build()
        .context("failed to build the tokio runtime")?;
    let shutdown = Shutdown::default();
    let signal = runtime.block_on(serve_until_shutdown(admin_address, store, &shutdown));
    info!("Shutdown complete after {signal}");
    Ok(())
}

async fn serve_until_shutdown(admin_address: &str, store: Arc<ConfigStore>, shutdown: &Shutdown) -> ShutdownSignal {
    let mut rx = shutdown.subscribe();
    let signals = shutdown.listen_for_signals();
    let admin = spawn_admin_server(admin_address, store);
    let signal = rx.recv().await;
    admin.abort();
    signals.abort();
    signal
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn manual_shutdown_stops_the_admin_server() {
        let shutdown = Shutdown::default();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger(ShutdownSignal::Manual);
        });
        let signal = tokio::time::timeout(
            Duration::from_secs(5),
            serve_until_shutdown("127.0.0.1:0", Arc::new(ConfigStore::default()), &shutdown),
        )
        .await
        .unwrap();
        assert_eq!(signal, ShutdownSignal::Manual);
    }
}
