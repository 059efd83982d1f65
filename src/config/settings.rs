//! Resolved server settings.

use std::net::SocketAddr;
use std::time::Duration;

use crate::config::options::Options;
use crate::config::validation::{join_host_port, resolve_listen_addr};
use crate::error::ConfigError;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default request head limit (1 MiB).
pub const DEFAULT_MAX_HEADER_BYTES: usize = 1 << 20;

/// Smallest read buffer hyper accepts.
const MIN_READ_BUFFER: usize = 8192;

/// Validated configuration of a server. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: String,
    pub max_header_bytes: usize,
    pub write_timeout: Duration,
    /// Bounds the request head only, from its first byte.
    pub read_timeout: Duration,
    pub idle_timeout: Duration,
    /// Address the listener binds.
    pub bind_addr: SocketAddr,
}

impl Settings {
    /// Resolve an option record, filling unset fields with defaults.
    pub fn resolve(options: Options) -> Result<Self, ConfigError> {
        let host = options.host.unwrap_or_default();
        let port = options.port.unwrap_or_default();
        let bind_addr = resolve_listen_addr(&host, &port)?;

        Ok(Self {
            host,
            port,
            max_header_bytes: options.max_header_bytes.unwrap_or(DEFAULT_MAX_HEADER_BYTES),
            write_timeout: options.write_timeout.unwrap_or(DEFAULT_WRITE_TIMEOUT),
            read_timeout: options.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT),
            idle_timeout: options.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT),
            bind_addr,
        })
    }

    /// The `host:port` string the server was configured with.
    pub fn addr(&self) -> String {
        join_host_port(&self.host, &self.port)
    }

    /// Request head read deadline, `None` when disabled.
    pub fn header_read_timeout(&self) -> Option<Duration> {
        non_zero(self.read_timeout)
    }

    /// Response deadline, `None` when disabled.
    pub fn response_timeout(&self) -> Option<Duration> {
        non_zero(self.write_timeout)
    }

    /// Keep-alive idle deadline. Falls back to the read timeout when zero.
    pub fn keep_alive_timeout(&self) -> Option<Duration> {
        non_zero(self.idle_timeout).or_else(|| self.header_read_timeout())
    }

    /// Read buffer size for a connection, which caps the request head.
    pub fn read_buffer_size(&self) -> usize {
        self.max_header_bytes.max(MIN_READ_BUFFER)
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    if d.is_zero() { None } else { Some(d) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options::*;

    fn resolve(opts: Vec<ServerOption>) -> Settings {
        Settings::resolve(Options::apply(opts).unwrap()).unwrap()
    }

    #[test]
    fn defaults_fill_unset_fields() {
        let settings = resolve(vec![]);
        assert_eq!(settings.write_timeout, Duration::from_secs(15));
        assert_eq!(settings.read_timeout, Duration::from_secs(15));
        assert_eq!(settings.idle_timeout, Duration::from_secs(60));
        assert_eq!(settings.max_header_bytes, 1 << 20);
        assert_eq!(settings.addr(), ":");
        assert_eq!(settings.bind_addr.port(), 0);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let settings = resolve(vec![
            with_host("127.0.0.1"),
            with_port(8443),
            with_write_timeout(Duration::from_millis(250)),
            with_read_timeout(Duration::from_secs(3)),
            with_idle_timeout(Duration::from_secs(7)),
            with_max_header_bytes(16 * 1024),
        ]);
        assert_eq!(settings.write_timeout, Duration::from_millis(250));
        assert_eq!(settings.read_timeout, Duration::from_secs(3));
        assert_eq!(settings.idle_timeout, Duration::from_secs(7));
        assert_eq!(settings.max_header_bytes, 16 * 1024);
        assert_eq!(settings.addr(), "127.0.0.1:8443");
        assert_eq!(settings.bind_addr, "127.0.0.1:8443".parse().unwrap());
    }

    #[test]
    fn zero_timeouts_disable_or_fall_back() {
        let settings = resolve(vec![
            with_write_timeout(Duration::ZERO),
            with_idle_timeout(Duration::ZERO),
        ]);
        assert_eq!(settings.response_timeout(), None);
        assert_eq!(settings.keep_alive_timeout(), Some(Duration::from_secs(15)));

        let settings = resolve(vec![
            with_read_timeout(Duration::ZERO),
            with_idle_timeout(Duration::ZERO),
        ]);
        assert_eq!(settings.header_read_timeout(), None);
        assert_eq!(settings.keep_alive_timeout(), None);
    }

    #[test]
    fn read_buffer_has_a_floor() {
        let settings = resolve(vec![with_max_header_bytes(100)]);
        assert_eq!(settings.max_header_bytes, 100);
        assert_eq!(settings.read_buffer_size(), 8192);
    }

    #[test]
    fn invalid_address_fails_resolution() {
        let options = Options::apply(vec![with_port(65536)]).unwrap();
        assert!(matches!(
            Settings::resolve(options),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }
}
