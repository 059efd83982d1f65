//! HTTP server with functional-options configuration and graceful shutdown.
//!
//! ```no_run
//! use std::time::Duration;
//! use axum::{routing::get, Router};
//! use graceful_server::config::{with_host, with_port};
//! use graceful_server::Server;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let app = Router::new().route("/", get(|| async { "ok" }));
//! let server = Server::new(
//!     &CancellationToken::new(),
//!     Some(app),
//!     [with_host("127.0.0.1"), with_port(8080)],
//! )?;
//! server.start_with_await_stop(Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::{ServerOption, Settings};
pub use error::{ConfigError, ServeError, ShutdownError};
pub use http::Server;
pub use lifecycle::{LifecycleState, TerminationSignal};
