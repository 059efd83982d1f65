//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, transient error backoff)
//!     → connection.rs (id, live count, request activity)
//!     → stream.rs (reads reported to the connection's activity)
//!     → Hand off to the HTTP layer
//!
//! Connection States:
//!     Active → Draining → Closed
//! ```
//!
//! # Design Decisions
//! - Each connection holds a guard so shutdown can wait for zero
//! - Idle detection is per connection, driven by request activity
//! - The read deadline runs from the first byte of a head until the request starts

pub mod connection;
pub mod listener;
pub mod stream;

pub use connection::{ConnectionActivity, ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::Listener;
pub use stream::ActivityStream;
