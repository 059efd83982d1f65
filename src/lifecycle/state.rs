//! Server lifecycle states.

use std::fmt;

/// Where a server is in its life.
///
/// ```text
/// Idle → Serving → Draining → Stopped
/// ```
///
/// Only `Draining` is bounded (by the stop timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Built, not yet listening.
    Idle,
    /// Accepting connections.
    Serving,
    /// No longer accepting; waiting for connections to finish.
    Draining,
    /// All connections closed, or the server failed.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Serving => "serving",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
