// Copyright (c) 2025 Opteryx Driver Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logging configuration for the driver.
//!
//! Initializes a `tracing-subscriber` with file or stderr output.
//!
//! ## Configuration priority
//!
//! 1. [`LogConfig`] passed by the host (highest)
//! 2. `RUST_LOG` environment variable
//! 3. Default: `warn`

use std::sync::OnceLock;

use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Logging configuration supplied by the host application.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Log level: "off", "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path. If unset, logs go to stderr.
    pub file: Option<String>,
}

/// Initialize the tracing subscriber.
///
/// Uses `OnceLock` so this is a no-op after the first call; safe for the
/// host to invoke from multiple entry points.
pub fn init_logging(config: &LogConfig) {
    LOGGING_INITIALIZED.get_or_init(|| {
        if let Some(ref level) = config.level {
            if level.eq_ignore_ascii_case("off") {
                return;
            }
        }

        let filter = if let Some(ref level) = config.level {
            EnvFilter::new(format!("opteryx_driver={}", level.to_lowercase()))
        } else {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("opteryx_driver=warn"))
        };

        if let Some(ref path) = config.file {
            let file = match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("opteryx-driver: failed to open log file {}: {}", path, e);
                    return;
                }
            };

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(file)
                        .with_target(false)
                        .with_ansi(false)
                        .with_timer(SystemTime),
                )
                .try_init()
                .ok();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_timer(SystemTime),
                )
                .try_init()
                .ok();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.level.is_none());
        assert!(config.file.is_none());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LogConfig {
            level: Some("off".to_string()),
            file: None,
        };
        init_logging(&config);
        init_logging(&config);
    }
}
