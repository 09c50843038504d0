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

use mosn_configuration::config::LogConfig;
use mosn_error::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;

/// Console stream used when no log directory is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    Stdout,
    /// Keeps stdout free for command output such as `--dump`.
    Stderr,
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer and must live as long as the process.
pub fn init(config: &LogConfig, console: Console) -> Result<Option<WorkerGuard>> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true);
    match &config.log_directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::never(directory, config.log_file());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder.with_ansi(false).with_writer(writer).try_init().context("failed to initialise logging")?;
            Ok(Some(guard))
        },
        None => {
            match console {
                Console::Stdout => builder.try_init(),
                Console::Stderr => builder.with_writer(std::io::stderr).try_init(),
            }
            .context("failed to initialise logging")?;
            Ok(None)
        },
    }
}
