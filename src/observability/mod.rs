//! Observability subsystem.
//!
//! Every subsystem emits structured `tracing` events (bind address,
//! connection ids, shutdown progress). `logging.rs` turns them into output.

pub mod logging;
