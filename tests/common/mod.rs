//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use graceful_server::config::{with_host, with_port, ServerOption};
use graceful_server::{Server, ShutdownError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Build a server on 127.0.0.1 with an OS-assigned port.
pub fn local_server(router: Router, extra: Vec<ServerOption>) -> Server {
    let mut options = vec![with_host("127.0.0.1"), with_port(0)];
    options.extend(extra);
    Server::new(&CancellationToken::new(), Some(router), options).unwrap()
}

/// A server running under `start_until`, stopped through a oneshot.
pub struct Running {
    pub server: Server,
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ShutdownError>>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Deliver the stop signal without waiting for shutdown.
    pub fn signal_stop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the runner to return without signalling it.
    pub async fn wait(self) -> Result<(), ShutdownError> {
        self.task.await.unwrap()
    }

    /// Deliver the stop signal and wait for the runner to return.
    pub async fn stop(mut self) -> Result<(), ShutdownError> {
        self.signal_stop();
        self.task.await.unwrap()
    }
}

/// Start `server` in the background and wait until it is listening.
pub async fn start(server: Server, stop_timeout: Duration) -> Running {
    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.clone().start_until(
        async move {
            let _ = rx.await;
        },
        stop_timeout,
    ));

    let addr = tokio::time::timeout(Duration::from_secs(5), server.local_addr())
        .await
        .expect("server did not bind in time")
        .expect("server stopped without binding");

    Running {
        server,
        addr,
        stop: Some(tx),
        task,
    }
}

/// HTTP client without connection pooling or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Write `request` on a raw connection and read until `marker` shows up.
pub async fn raw_exchange(stream: &mut TcpStream, request: &str, marker: &str) -> String {
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("response timed out")
            .unwrap();
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
        if String::from_utf8_lossy(&received).contains(marker) {
            break;
        }
    }
    String::from_utf8_lossy(&received).into_owned()
}

/// Wait for the peer to close `stream`. Returns false on timeout.
pub async fn closed_within(stream: &mut TcpStream, limit: Duration) -> bool {
    let mut buf = [0u8; 1024];
    let drained = async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    };
    tokio::time::timeout(limit, drained).await.is_ok()
}
