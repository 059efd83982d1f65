//! HTTP server construction and connection serving.
//!
//! # Responsibilities
//! - Build a `Server` from functional options
//! - Accept connections and serve HTTP/1.1 with hyper
//! - Enforce read, write and idle timeouts per connection
//! - Hand every request a child of the server's base token
//! - Drain connections on shutdown and force-close them at the deadline

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::config::{Options, ServerOption, Settings};
use crate::error::{ConfigError, ServeError, ShutdownError};
use crate::lifecycle::{LifecycleState, ShutdownHooks};
use crate::net::connection::{ConnectionActivity, RequestGuard};
use crate::net::{ActivityStream, ConnectionTracker, Listener};

/// An HTTP server built from options.
///
/// Cloning is cheap and every clone controls the same server, so one clone
/// can run [`start_with_await_stop`](Self::start_with_await_stop) while
/// another observes it.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Settings,
    router: Router,
    /// Parent of every request token. Cancelled by the first shutdown hook.
    base: CancellationToken,
    hooks: ShutdownHooks,
    connections: ConnectionTracker,
    keep_alives: watch::Sender<bool>,
    local_addr: watch::Sender<Option<SocketAddr>>,
    state: watch::Sender<LifecycleState>,
    shutting_down: AtomicBool,
    /// Stops the accept loop.
    stop_accepting: CancellationToken,
    /// Asks every connection to finish its exchange and close.
    drain: CancellationToken,
    /// Drops every connection immediately.
    force_close: CancellationToken,
}

impl Server {
    /// Build a server for `handler`, applying `options` in order.
    ///
    /// The server's base token is a child of `parent`; it is cancelled when
    /// shutdown begins.
    pub fn new<I>(
        parent: &CancellationToken,
        handler: Option<Router>,
        options: I,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ServerOption>,
    {
        let router = handler.ok_or(ConfigError::MissingHandler)?;
        let settings = Settings::resolve(Options::apply(options)?)?;

        let base = parent.child_token();
        let hooks = ShutdownHooks::new();
        let cancel = base.clone();
        hooks.register(move || cancel.cancel());

        tracing::debug!(
            address = %settings.addr(),
            max_header_bytes = settings.max_header_bytes,
            write_timeout = ?settings.write_timeout,
            read_timeout = ?settings.read_timeout,
            idle_timeout = ?settings.idle_timeout,
            "Server configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                router,
                base,
                hooks,
                connections: ConnectionTracker::new(),
                keep_alives: watch::channel(true).0,
                local_addr: watch::channel(None).0,
                state: watch::channel(LifecycleState::Idle).0,
                shutting_down: AtomicBool::new(false),
                stop_accepting: CancellationToken::new(),
                drain: CancellationToken::new(),
                force_close: CancellationToken::new(),
            }),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// The configured `host:port`.
    pub fn addr(&self) -> String {
        self.inner.settings.addr()
    }

    /// Token cancelled when shutdown begins.
    pub fn base_token(&self) -> &CancellationToken {
        &self.inner.base
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.inner.state.borrow()
    }

    /// Live connection count.
    pub fn active_connections(&self) -> usize {
        self.inner.connections.active_count()
    }

    /// Address the listener is bound to, once bound.
    ///
    /// Resolves to `None` if the server stops without ever binding.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut addr = self.inner.local_addr.subscribe();
        let mut state = self.inner.state.subscribe();
        tokio::select! {
            bound = async { addr.wait_for(|a| a.is_some()).await.ok().and_then(|a| *a) } => bound,
            _ = state.wait_for(|s| *s == LifecycleState::Stopped) => *self.inner.local_addr.borrow(),
        }
    }

    /// Register a hook to run when shutdown begins.
    pub fn register_on_shutdown<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.hooks.register(hook);
    }

    /// Enable or disable HTTP keep-alive.
    ///
    /// When disabled, new connections serve one request and open
    /// connections close after their current exchange.
    pub fn set_keep_alives_enabled(&self, enabled: bool) {
        let previous = self.inner.keep_alives.send_replace(enabled);
        if previous != enabled {
            tracing::debug!(enabled, "Keep-alives toggled");
        }
    }

    pub fn keep_alives_enabled(&self) -> bool {
        *self.inner.keep_alives.borrow()
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns `Ok(())` once shutdown has stopped the accept loop.
    pub async fn listen_and_serve(&self) -> Result<(), ServeError> {
        if self.inner.stop_accepting.is_cancelled() {
            return Ok(());
        }
        let listener = match Listener::bind(self.inner.settings.bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.inner.set_state(LifecycleState::Stopped);
                return Err(e);
            }
        };
        self.serve_listener(listener).await
    }

    /// Serve on a listener bound by the caller.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServeError> {
        self.serve_listener(Listener::from_tokio(listener)?).await
    }

    async fn serve_listener(&self, listener: Listener) -> Result<(), ServeError> {
        let inner = &self.inner;
        if inner.stop_accepting.is_cancelled() {
            return Ok(());
        }

        let addr = listener.local_addr();
        inner.state.send_if_modified(|s| {
            if *s == LifecycleState::Idle {
                *s = LifecycleState::Serving;
                true
            } else {
                false
            }
        });
        inner.local_addr.send_replace(Some(addr));

        tracing::info!(address = %addr, "HTTP server starting");

        let result = loop {
            tokio::select! {
                biased;
                _ = inner.stop_accepting.cancelled() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(e) => {
                        tracing::error!(address = %addr, error = %e, "Accept loop failed");
                        inner.set_state(LifecycleState::Stopped);
                        break Err(e);
                    }
                },
            }
        };

        drop(listener);
        tracing::info!(address = %addr, "HTTP server stopped accepting");
        result
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let inner = Arc::clone(&self.inner);
        let guard = inner.connections.track();
        let id = guard.id();
        let activity = guard.activity();

        let mut keep_alive_rx = inner.keep_alives.subscribe();
        let keep_alive = *keep_alive_rx.borrow_and_update();

        let settings = &inner.settings;
        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .keep_alive(keep_alive)
            .max_buf_size(settings.read_buffer_size())
            // hyper's own header timer also runs while a keep-alive
            // connection waits for its next request. The read deadline is
            // enforced below instead.
            .header_read_timeout(None);

        let service = {
            let router = inner.router.clone();
            let base = inner.base.clone();
            let activity = Arc::clone(&activity);
            let write_timeout = settings.response_timeout();
            service_fn(move |req: Request<Incoming>| {
                let request = activity.begin();
                dispatch(router.clone(), base.child_token(), write_timeout, req, request)
            })
        };
        let idle_timeout = settings.keep_alive_timeout();
        let read_timeout = settings.header_read_timeout();
        let io = TokioIo::new(ActivityStream::new(stream, Arc::clone(&activity)));
        let conn = builder.serve_connection(io, service);

        tracing::debug!(connection_id = %id, peer_addr = %peer, keep_alive, "Serving connection");

        tokio::spawn(async move {
            let _guard = guard;
            tokio::pin!(conn);
            let mut draining = false;

            loop {
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!(connection_id = %id, peer_addr = %peer, error = %e, "Connection error");
                        }
                        break;
                    }
                    _ = inner.force_close.cancelled() => {
                        tracing::debug!(connection_id = %id, "Forcing connection closed");
                        break;
                    }
                    _ = head_deadline(&activity, read_timeout) => {
                        tracing::debug!(connection_id = %id, peer_addr = %peer, "Request head read timed out");
                        break;
                    }
                    _ = inner.drain.cancelled(), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                    _ = keep_alive_disabled(&mut keep_alive_rx), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                    _ = idle_deadline(&activity, idle_timeout), if !draining => {
                        tracing::debug!(connection_id = %id, "Closing idle connection");
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        });
    }

    /// Gracefully shut down within `timeout`.
    ///
    /// Stops accepting, runs shutdown hooks, lets in-flight requests finish
    /// and closes idle connections. Connections still open at the deadline
    /// are dropped and `ShutdownError::DeadlineExceeded` is returned.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError> {
        self.shutdown_before(Instant::now() + timeout, timeout).await
    }

    pub(crate) async fn shutdown_before(
        &self,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<(), ShutdownError> {
        let inner = &self.inner;
        if inner.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(ShutdownError::AlreadyShuttingDown);
        }

        inner.set_state(LifecycleState::Draining);
        tracing::info!(
            timeout = ?timeout,
            connections = inner.connections.active_count(),
            "Graceful shutdown started"
        );

        inner.stop_accepting.cancel();
        let hooks = inner.hooks.run();
        tracing::debug!(hooks, "Shutdown hooks ran");
        inner.drain.cancel();

        let result = match tokio::time::timeout_at(deadline, inner.connections.wait_idle()).await {
            Ok(()) => {
                tracing::info!("All connections drained");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    remaining = inner.connections.active_count(),
                    "Shutdown deadline exceeded, forcing connections closed"
                );
                inner.force_close.cancel();
                Err(ShutdownError::DeadlineExceeded(timeout))
            }
        };

        inner.set_state(LifecycleState::Stopped);
        result
    }

    /// Close the listener and every connection immediately.
    ///
    /// Shutdown hooks do not run.
    pub fn close(&self) {
        let inner = &self.inner;
        inner.shutting_down.store(true, Ordering::SeqCst);
        inner.stop_accepting.cancel();
        inner.drain.cancel();
        inner.force_close.cancel();
        inner.set_state(LifecycleState::Stopped);
        tracing::info!("Server closed");
    }

    pub(crate) fn mark_stopped(&self) {
        self.inner.set_state(LifecycleState::Stopped);
    }
}

impl Inner {
    fn set_state(&self, state: LifecycleState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Lifecycle state changed");
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("settings", &self.inner.settings)
            .field("state", &self.state())
            .field("connections", &self.active_connections())
            .finish()
    }
}

/// Run one request through the router within the write timeout.
///
/// An expired timeout aborts the connection without a response.
async fn dispatch(
    router: Router,
    token: CancellationToken,
    write_timeout: Option<Duration>,
    mut req: Request<Incoming>,
    _request: RequestGuard,
) -> Result<Response<Body>, ServeError> {
    req.extensions_mut().insert(token);

    let call = router.oneshot(req);
    let response = match write_timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            tracing::warn!(timeout = ?limit, "Handler exceeded write timeout");
            ServeError::WriteTimeout(limit)
        })?,
        None => call.await,
    };

    match response {
        Ok(response) => Ok(response),
        Err(never) => match never {},
    }
}

async fn keep_alive_disabled(rx: &mut watch::Receiver<bool>) {
    loop {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if !*rx.borrow_and_update() {
            return;
        }
    }
}

async fn idle_deadline(activity: &ConnectionActivity, timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => activity.idle_expired(timeout).await,
        None => std::future::pending().await,
    }
}

async fn head_deadline(activity: &ConnectionActivity, timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => activity.head_read_expired(timeout).await,
        None => std::future::pending().await,
    }
}
