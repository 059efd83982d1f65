//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for the termination set (SIGINT, SIGABRT, SIGQUIT,
//!   SIGTERM, SIGHUP)
//! - Report which signal arrived first
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Registration is explicit: `install` before waiting, `uninstall` after
//! - Tokio keeps its process-level handler once installed, so uninstalling
//!   stops delivery to us but does not restore the default disposition
//! - Non-unix targets only observe Ctrl-C

use std::fmt;
use std::io;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

#[cfg(unix)]
const SIGABRT: i32 = 6;

/// A signal that asks the server to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationSignal {
    Interrupt,
    Abort,
    Quit,
    Terminate,
    Hangup,
}

impl TerminationSignal {
    /// Every signal the lifecycle runner listens for.
    pub const ALL: [TerminationSignal; 5] = [
        TerminationSignal::Interrupt,
        TerminationSignal::Abort,
        TerminationSignal::Quit,
        TerminationSignal::Terminate,
        TerminationSignal::Hangup,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Abort => "SIGABRT",
            TerminationSignal::Quit => "SIGQUIT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Hangup => "SIGHUP",
        }
    }

    #[cfg(unix)]
    fn kind(&self) -> SignalKind {
        match self {
            TerminationSignal::Interrupt => SignalKind::interrupt(),
            TerminationSignal::Abort => SignalKind::from_raw(SIGABRT),
            TerminationSignal::Quit => SignalKind::quit(),
            TerminationSignal::Terminate => SignalKind::terminate(),
            TerminationSignal::Hangup => SignalKind::hangup(),
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registered handlers for the termination signal set.
///
/// Each stream buffers one pending delivery, so a signal that arrives before
/// [`recv`](Self::recv) is polled is not lost.
#[derive(Debug)]
pub struct TerminationSignals {
    #[cfg(unix)]
    streams: Vec<(TerminationSignal, Signal)>,
}

impl TerminationSignals {
    /// Register handlers for every signal in [`TerminationSignal::ALL`].
    ///
    /// Must be called from within a Tokio runtime.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        let streams = TerminationSignal::ALL
            .iter()
            .map(|sig| signal(sig.kind()).map(|stream| (*sig, stream)))
            .collect::<io::Result<Vec<_>>>()?;

        tracing::debug!(signals = ?TerminationSignal::ALL, "Termination signal handlers installed");
        Ok(Self { streams })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        tracing::debug!("Ctrl-C handler installed");
        Ok(Self {})
    }

    /// Wait for the first termination signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> TerminationSignal {
        let waiters = self.streams.iter_mut().map(|(sig, stream)| {
            Box::pin(async move {
                stream.recv().await;
                *sig
            })
        });
        let (sig, _, _) = futures_util::future::select_all(waiters).await;
        sig
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> TerminationSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        TerminationSignal::Interrupt
    }

    /// Stop listening for termination signals.
    pub fn uninstall(self) {
        tracing::debug!("Termination signal handlers removed");
    }
}
