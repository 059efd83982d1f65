//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Runner (runner.rs):
//!     Install signals → Spawn accept loop → Wait for stop → Shutdown
//!
//! Shutdown:
//!     Disable keep-alives → Stop accepting → Run hooks (cancel base token)
//!     → Drain connections → Force close at deadline
//!
//! Signals (signals.rs):
//!     SIGINT/SIGABRT/SIGQUIT/SIGTERM/SIGHUP → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - The deadline is measured from signal receipt, not tied to the base
//!   token (the first shutdown hook cancels that token)
//! - A serve failure ends the runner instead of waiting for a signal
//! - Shutdown has a timeout: forced close after the deadline

pub mod runner;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::ShutdownHooks;
pub use signals::{TerminationSignal, TerminationSignals};
pub use state::LifecycleState;
