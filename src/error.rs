//! Error types for building, serving and stopping a server.

use std::net::SocketAddr;
use std::time::Duration;

/// Error returned while building a [`Server`](crate::Server).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No request handler was supplied.
    #[error("undefined handler")]
    MissingHandler,

    /// A port option was given a negative value.
    #[error("port cannot be less than zero (got {0})")]
    NegativePort(i64),

    /// The resolved `host:port` is not a usable TCP address.
    #[error("invalid listen address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },
}

/// Error produced by the accept loop or a single request exchange.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),

    /// The handler did not produce a response within the write timeout.
    #[error("handler exceeded write timeout of {0:?}")]
    WriteTimeout(Duration),

    #[error("serve task failed: {0}")]
    Task(String),
}

/// Error returned by the shutdown path.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// Connections were still open when the stop timeout elapsed.
    #[error("graceful shutdown did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("shutdown already in progress")]
    AlreadyShuttingDown,

    /// The server stopped serving before a stop signal arrived.
    #[error(transparent)]
    Serve(#[from] ServeError),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

impl ShutdownError {
    /// True when the drain ran out of time.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, ShutdownError::DeadlineExceeded(_))
    }
}
