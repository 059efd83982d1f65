//! Functional options applied by [`Server::new`](crate::Server::new).
//!
//! Every option mutates exactly one field of [`Options`]. Options run in the
//! order given, so a later option for the same field overwrites an earlier
//! one.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// Unresolved option record. Every field starts unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub host: Option<String>,
    pub port: Option<String>,
    pub max_header_bytes: Option<usize>,
    pub write_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

impl Options {
    /// Apply options in order, stopping at the first one that fails.
    pub fn apply<I>(options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ServerOption>,
    {
        let mut record = Options::default();
        for option in options {
            option.apply(&mut record)?;
        }
        Ok(record)
    }
}

type ApplyFn = dyn FnOnce(&mut Options) -> Result<(), ConfigError> + Send;

/// A single configuration step for a server.
pub struct ServerOption {
    name: &'static str,
    apply: Box<ApplyFn>,
}

impl ServerOption {
    fn new<F>(name: &'static str, apply: F) -> Self
    where
        F: FnOnce(&mut Options) -> Result<(), ConfigError> + Send + 'static,
    {
        Self {
            name,
            apply: Box::new(apply),
        }
    }

    /// Name of the field this option sets.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn apply(self, options: &mut Options) -> Result<(), ConfigError> {
        (self.apply)(options)
    }
}

impl fmt::Debug for ServerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServerOption").field(&self.name).finish()
    }
}

/// Host or IP to listen on. Empty means all interfaces.
pub fn with_host(host: impl Into<String>) -> ServerOption {
    let host = host.into();
    ServerOption::new("host", move |options| {
        options.host = Some(host);
        Ok(())
    })
}

/// Port to listen on. `0` lets the OS choose an available port.
pub fn with_port(port: i64) -> ServerOption {
    ServerOption::new("port", move |options| {
        if port < 0 {
            return Err(ConfigError::NegativePort(port));
        }
        options.port = Some(port.to_string());
        Ok(())
    })
}

/// Upper bound on the size of a request head.
pub fn with_max_header_bytes(bytes: usize) -> ServerOption {
    ServerOption::new("max_header_bytes", move |options| {
        options.max_header_bytes = Some(bytes);
        Ok(())
    })
}

/// Time a handler has to produce its response. Zero disables the limit.
pub fn with_write_timeout(timeout: Duration) -> ServerOption {
    ServerOption::new("write_timeout", move |options| {
        options.write_timeout = Some(timeout);
        Ok(())
    })
}

/// Time allowed to read a request head, counted from its first byte.
/// Request bodies are not covered. Zero disables the limit.
pub fn with_read_timeout(timeout: Duration) -> ServerOption {
    ServerOption::new("read_timeout", move |options| {
        options.read_timeout = Some(timeout);
        Ok(())
    })
}

/// Time a keep-alive connection may sit idle between requests.
///
/// Zero falls back to the read timeout.
pub fn with_idle_timeout(timeout: Duration) -> ServerOption {
    ServerOption::new("idle_timeout", move |options| {
        options.idle_timeout = Some(timeout);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_start_unset() {
        let options = Options::apply(Vec::new()).unwrap();
        assert_eq!(options, Options::default());
    }

    #[test]
    fn each_option_sets_one_field() {
        let options = Options::apply([with_host("localhost")]).unwrap();
        assert_eq!(options.host.as_deref(), Some("localhost"));
        assert!(options.port.is_none());
        assert!(options.write_timeout.is_none());

        let options = Options::apply([with_max_header_bytes(4096)]).unwrap();
        assert_eq!(options.max_header_bytes, Some(4096));
        assert!(options.host.is_none());
    }

    #[test]
    fn later_option_wins() {
        let options = Options::apply([
            with_port(8081),
            with_read_timeout(Duration::from_secs(1)),
            with_port(8082),
            with_read_timeout(Duration::from_secs(2)),
        ])
        .unwrap();

        assert_eq!(options.port.as_deref(), Some("8082"));
        assert_eq!(options.read_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn negative_port_is_rejected() {
        let err = Options::apply([with_port(-1)]).unwrap_err();
        assert!(matches!(err, ConfigError::NegativePort(-1)));
    }

    #[test]
    fn failing_option_stops_the_sequence() {
        let err = Options::apply([with_port(-5), with_port(80)]).unwrap_err();
        assert!(matches!(err, ConfigError::NegativePort(-5)));
    }

    #[test]
    fn zero_port_is_accepted() {
        let options = Options::apply([with_port(0)]).unwrap();
        assert_eq!(options.port.as_deref(), Some("0"));
    }

    #[test]
    fn debug_shows_option_name() {
        assert_eq!(format!("{:?}", with_idle_timeout(Duration::ZERO)), "ServerOption(\"idle_timeout\")");
    }
}
