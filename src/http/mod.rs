//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1 connection, timeouts, drain)
//!     → caller's axum Router (request carries a CancellationToken extension)
//!     → response written back on the same connection
//! ```

pub mod server;

pub use server::Server;
