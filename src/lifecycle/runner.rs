//! Start a server and stop it on a termination signal.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ServeError, ShutdownError};
use crate::http::Server;
use crate::lifecycle::signals::TerminationSignals;

impl Server {
    /// Serve in the background until a termination signal arrives, then shut
    /// down gracefully within `stop_timeout`.
    ///
    /// Returns `Ok(())` when every connection drained in time.
    pub async fn start_with_await_stop(self, stop_timeout: Duration) -> Result<(), ShutdownError> {
        let mut signals = TerminationSignals::install().map_err(ShutdownError::Signals)?;

        let stop = async {
            let signal = signals.recv().await;
            tracing::info!(signal = %signal, "Termination signal received");
        };
        let result = self.start_until(stop, stop_timeout).await;

        signals.uninstall();
        result
    }

    /// Like [`start_with_await_stop`](Self::start_with_await_stop), but stops
    /// when `stop` resolves instead of on a signal.
    ///
    /// If the server fails to bind or its accept loop dies before `stop`
    /// resolves, the failure is returned as `ShutdownError::Serve`.
    pub async fn start_until<F>(self, stop: F, stop_timeout: Duration) -> Result<(), ShutdownError>
    where
        F: Future<Output = ()>,
    {
        let server = self.clone();
        let mut serve_task = tokio::spawn(async move { server.listen_and_serve().await });
        tokio::pin!(stop);

        tokio::select! {
            _ = &mut stop => {}
            joined = &mut serve_task => {
                let err = match joined {
                    // Shut down through another handle.
                    Ok(Ok(())) => return Ok(()),
                    Ok(Err(e)) => e,
                    Err(e) => ServeError::Task(e.to_string()),
                };
                tracing::error!(error = %err, "Server stopped before a stop signal");
                self.mark_stopped();
                return Err(ShutdownError::Serve(err));
            }
        }

        let deadline = Instant::now() + stop_timeout;
        self.set_keep_alives_enabled(false);
        let result = self.shutdown_before(deadline, stop_timeout).await;

        match serve_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Accept loop ended with an error"),
            Err(e) => tracing::warn!(error = %e, "Serve task panicked"),
        }

        match &result {
            Ok(()) => tracing::info!("Shutdown complete"),
            Err(e) => tracing::warn!(error = %e, "Shutdown finished with an error"),
        }
        result
    }
}
