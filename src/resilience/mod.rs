//! Resilience helpers.
//!
//! The accept loop is the only retrying path: transient accept errors back
//! off exponentially instead of spinning or killing the listener.

pub mod backoff;
