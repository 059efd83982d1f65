//! TCP listener with accept backoff.
//!
//! # Responsibilities
//! - Bind to the resolved listen address
//! - Accept incoming TCP connections
//! - Back off on transient accept errors (fd exhaustion, aborted handshakes)

use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

use crate::error::ServeError;
use crate::resilience::backoff::accept_backoff;

const ENFILE: i32 = 23;
const EMFILE: i32 = 24;

/// A bound TCP listener.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to `addr`. Port 0 picks an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;
        Self::from_tokio(listener)
    }

    /// Wrap a listener bound by the caller.
    pub fn from_tokio(listener: TcpListener) -> Result<Self, ServeError> {
        let local_addr = listener.local_addr().map_err(ServeError::LocalAddr)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner: listener,
            local_addr,
        })
    }

    /// Accept a new connection.
    ///
    /// Transient errors are retried with backoff; anything else is returned.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServeError> {
        let mut attempt = 0;
        loop {
            match self.inner.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!(peer_addr = %addr, "Connection accepted");
                    return Ok((stream, addr));
                }
                Err(e) if is_transient(&e) => {
                    attempt += 1;
                    let delay = accept_backoff(attempt);
                    tracing::warn!(error = %e, retry_in = ?delay, "Accept failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(ServeError::Accept(e)),
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) || matches!(e.raw_os_error(), Some(ENFILE) | Some(EMFILE))
}
