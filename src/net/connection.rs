//! Connection lifetime and activity tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live connections so shutdown can wait for zero
//! - Track in-flight requests, head reads and last activity per
//!   connection for idle and read deadlines

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks live connections for graceful shutdown.
///
/// The count lives in a watch channel so waiters wake on every change.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    count: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { count: Arc::new(tx) }
    }

    /// Record a new connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.count.send_modify(|n| *n += 1);
        ConnectionGuard {
            count: Arc::clone(&self.count),
            id: ConnectionId::new(),
            activity: Arc::new(ConnectionActivity::new()),
        }
    }

    /// Get current live connection count.
    pub fn active_count(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until every tracked connection has closed.
    pub async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender is owned by `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements the live count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    count: Arc<watch::Sender<usize>>,
    id: ConnectionId,
    activity: Arc<ConnectionActivity>,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Request activity of this connection.
    pub fn activity(&self) -> Arc<ConnectionActivity> {
        Arc::clone(&self.activity)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// In-flight requests and read progress on one connection.
///
/// A connection is idle when no request is in flight and no bytes of a new
/// request head have arrived. The read deadline starts with the first byte
/// read while idle and ends when the head is complete (the request begins).
#[derive(Debug)]
pub struct ConnectionActivity {
    in_flight: AtomicUsize,
    last_active: Mutex<Instant>,
    head_started: Mutex<Option<Instant>>,
    changed: Notify,
}

impl ConnectionActivity {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            last_active: Mutex::new(Instant::now()),
            head_started: Mutex::new(None),
            changed: Notify::new(),
        }
    }

    /// Mark a request as started. The returned guard marks it finished.
    pub fn begin(self: &Arc<Self>) -> RequestGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        *lock(&self.head_started) = None;
        self.touch();
        self.changed.notify_waiters();
        RequestGuard {
            activity: Arc::clone(self),
        }
    }

    /// Record bytes read from the peer.
    pub fn bytes_read(&self) {
        if self.in_flight() > 0 {
            return;
        }
        let mut started = lock(&self.head_started);
        if started.is_none() {
            *started = Some(Instant::now());
            drop(started);
            self.changed.notify_waiters();
        }
    }

    /// Number of requests currently being handled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// True while a request head is partially read.
    pub fn reading_head(&self) -> bool {
        lock(&self.head_started).is_some()
    }

    fn touch(&self) {
        *lock(&self.last_active) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        lock(&self.last_active).elapsed()
    }

    /// Resolve once the connection has been idle for `timeout`.
    pub async fn idle_expired(&self, timeout: Duration) {
        loop {
            if self.in_flight() > 0 || self.reading_head() {
                tokio::time::sleep(timeout).await;
                continue;
            }
            let idle = self.idle_for();
            if idle >= timeout {
                return;
            }
            tokio::time::sleep(timeout - idle).await;
        }
    }

    /// Resolve once a request head has been arriving for longer than `timeout`.
    pub async fn head_read_expired(&self, timeout: Duration) {
        loop {
            // Registered before the check so a concurrent change is not missed.
            let changed = self.changed.notified();
            let started = *lock(&self.head_started);
            match started {
                None => changed.await,
                Some(at) => {
                    let elapsed = at.elapsed();
                    if elapsed >= timeout {
                        return;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(timeout - elapsed) => {}
                        _ = changed => {}
                    }
                }
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Default for ConnectionActivity {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one request in flight until dropped.
#[derive(Debug)]
pub struct RequestGuard {
    activity: Arc<ConnectionActivity>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.activity.touch();
        self.activity.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.activity.changed.notify_waiters();
    }
}
