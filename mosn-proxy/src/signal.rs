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

use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{info, warn};

/// What ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    #[cfg(unix)]
    Terminate,
    Manual,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT (CTRL+C)"),
            #[cfg(unix)]
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Manual => write!(f, "Manual"),
        }
    }
}

/// Fans a shutdown request out to every subscriber.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<ShutdownSignal>,
}

impl Default for Shutdown {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self { tx }
    }
}

impl Shutdown {
    pub fn subscribe(&self) -> ShutdownReceiver {
        ShutdownReceiver { rx: self.tx.subscribe() }
    }

    pub fn trigger(&self, signal: ShutdownSignal) {
        if self.tx.send(signal).is_err() {
            warn!("Shutdown {signal} requested with nobody listening");
        }
    }

    /// Forwards OS signals to the subscribers. Must be called inside a tokio runtime.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            match wait_for_os_signal().await {
                Ok(signal) => {
                    info!("Received {signal} signal, initiating shutdown...");
                    shutdown.trigger(signal);
                },
                Err(err) => warn!("Signal handler error: {err}"),
            }
        })
    }
}

pub struct ShutdownReceiver {
    rx: broadcast::Receiver<ShutdownSignal>,
}

impl ShutdownReceiver {
    /// Waits for the first shutdown request. A dropped sender counts as a manual shutdown.
    pub async fn recv(&mut self) -> ShutdownSignal {
        loop {
            match self.rx.recv().await {
                Ok(signal) => return signal,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return ShutdownSignal::Manual,
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() -> std::io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => Ok(ShutdownSignal::Interrupt),
        _ = sigterm.recv() => Ok(ShutdownSignal::Terminate),
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() -> std::io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownSignal::Interrupt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn manual_shutdown_reaches_every_subscriber() {
        let shutdown = Shutdown::default();
        let mut first = shutdown.subscribe();
        let mut second = shutdown.subscribe();
        shutdown.trigger(ShutdownSignal::Manual);

        let signal = tokio::time::timeout(Duration::from_millis(100), first.recv()).await.unwrap();
        assert_eq!(signal, ShutdownSignal::Manual);
        let signal = tokio::time::timeout(Duration::from_millis(100), second.recv()).await.unwrap();
        assert_eq!(signal, ShutdownSignal::Manual);
    }

    #[tokio::test]
    async fn dropped_sender_ends_the_wait() {
        let shutdown = Shutdown::default();
        let mut rx = shutdown.subscribe();
        drop(shutdown);
        assert_eq!(rx.recv().await, ShutdownSignal::Manual);
    }

    #[traced_test]
    #[test]
    fn trigger_without_subscribers() {
        Shutdown::default().trigger(ShutdownSignal::Interrupt);
        assert!(logs_contain("Shutdown SIGINT (CTRL+C) requested with nobody listening"));
    }

    #[test]
    fn signal_display() {
        assert_eq!(ShutdownSignal::Interrupt.to_string(), "SIGINT (CTRL+C)");
        assert_eq!(ShutdownSignal::Manual.to_string(), "Manual");
        #[cfg(unix)]
        assert_eq!(ShutdownSignal::Terminate.to_string(), "SIGTERM");
    }
}
