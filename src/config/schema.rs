//! Configuration file schema.
//!
//! All fields are optional; anything left out falls through to the server
//! defaults. Types derive Serde traits for deserialization from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::options::{
    with_host, with_idle_timeout, with_max_header_bytes, with_port, with_read_timeout,
    with_write_timeout, ServerOption,
};
use crate::observability::logging::LogFormat;

/// Root configuration for the server binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Listener and timeout settings.
    pub server: ServerConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Server settings. Unset fields keep the built-in defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<i64>,
    pub max_header_bytes: Option<usize>,
    pub write_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

impl ServerConfig {
    /// Options for every field present in the file, in field order.
    pub fn options(&self) -> Vec<ServerOption> {
        let mut options = Vec::new();
        if let Some(host) = &self.host {
            options.push(with_host(host.clone()));
        }
        if let Some(port) = self.port {
            options.push(with_port(port));
        }
        if let Some(bytes) = self.max_header_bytes {
            options.push(with_max_header_bytes(bytes));
        }
        if let Some(ms) = self.write_timeout_ms {
            options.push(with_write_timeout(Duration::from_millis(ms)));
        }
        if let Some(ms) = self.read_timeout_ms {
            options.push(with_read_timeout(Duration::from_millis(ms)));
        }
        if let Some(ms) = self.idle_timeout_ms {
            options.push(with_idle_timeout(Duration::from_millis(ms)));
        }
        options
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight requests to finish.
    pub stop_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: 30_000,
        }
    }
}

impl ShutdownConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,

    /// Filter used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "graceful_server=info,tower_http=info".to_string(),
        }
    }
}
