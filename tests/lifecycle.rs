//! Start / stop scenarios for the lifecycle runner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::Extension;
use axum::routing::get;
use axum::Router;
use graceful_server::config::{with_host, with_port};
use graceful_server::{LifecycleState, ServeError, Server, ShutdownError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

mod common;

/// Router whose `/slow` handler signals entry and then sleeps, ignoring shutdown.
fn slow_router(entered: Arc<Notify>, sleep: Duration) -> Router {
    Router::new().route(
        "/slow",
        get(move || {
            let entered = entered.clone();
            async move {
                entered.notify_one();
                tokio::time::sleep(sleep).await;
                "done"
            }
        }),
    )
}

#[tokio::test]
async fn serves_request_before_stop() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "hello"
            }
        }),
    );

    let running = common::start(common::local_server(router, vec![]), Duration::from_secs(5)).await;
    assert_ne!(running.addr.port(), 0, "port 0 should become an ephemeral port");
    assert_eq!(running.server.state(), LifecycleState::Serving);

    let res = common::client().get(running.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "hello");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn idle_server_stops_quickly() {
    let router = Router::new().route("/", get(|| async { "ok" }));
    let running = common::start(common::local_server(router, vec![]), Duration::from_secs(5)).await;
    let server = running.server.clone();

    // Leave a keep-alive connection idle in the pool.
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    client.get(running.url("/")).send().await.unwrap();

    let started = Instant::now();
    running.stop().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert_eq!(server.state(), LifecycleState::Stopped);
    assert!(!server.keep_alives_enabled());
}

#[tokio::test]
async fn slow_request_exceeds_deadline() {
    let entered = Arc::new(Notify::new());
    let router = slow_router(entered.clone(), Duration::from_secs(5));
    let running = common::start(common::local_server(router, vec![]), Duration::from_millis(100)).await;
    let server = running.server.clone();

    let url = running.url("/slow");
    let request = tokio::spawn(async move { common::client().get(url).send().await });
    entered.notified().await;

    let started = Instant::now();
    let err = running.stop().await.unwrap_err();

    assert!(err.is_deadline_exceeded(), "unexpected error: {err:?}");
    assert!(matches!(err, ShutdownError::DeadlineExceeded(d) if d == Duration::from_millis(100)));
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());

    // The abandoned request is cut off rather than completed.
    let response = tokio::time::timeout(Duration::from_secs(2), request)
        .await
        .expect("client should see the forced close")
        .unwrap();
    assert!(response.is_err());

    tokio::time::timeout(Duration::from_secs(2), async {
        while server.active_connections() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("forced connections should be released");
}

#[tokio::test]
async fn in_flight_request_finishes_within_deadline() {
    let entered = Arc::new(Notify::new());
    let router = slow_router(entered.clone(), Duration::from_millis(300));
    let running = common::start(common::local_server(router, vec![]), Duration::from_secs(5)).await;

    let url = running.url("/slow");
    let request = tokio::spawn(async move { common::client().get(url).send().await });
    entered.notified().await;

    running.stop().await.unwrap();

    let res = request.await.unwrap().unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "done");
}

#[tokio::test]
async fn shutdown_cancels_request_tokens() {
    let entered = Arc::new(Notify::new());
    let flag = entered.clone();
    let router = Router::new().route(
        "/wait",
        get(move |Extension(token): Extension<CancellationToken>| {
            let flag = flag.clone();
            async move {
                flag.notify_one();
                token.cancelled().await;
                "cancelled"
            }
        }),
    );

    let running = common::start(common::local_server(router, vec![]), Duration::from_secs(5)).await;
    let base = running.server.base_token().clone();

    let url = running.url("/wait");
    let request = tokio::spawn(async move { common::client().get(url).send().await });
    entered.notified().await;
    assert!(!base.is_cancelled());

    let started = Instant::now();
    running.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(base.is_cancelled());

    let res = request.await.unwrap().unwrap();
    assert_eq!(res.text().await.unwrap(), "cancelled");
}

#[tokio::test]
async fn shutdown_hooks_run_after_base_cancel() {
    let router = Router::new().route("/", get(|| async { "ok" }));
    let server = common::local_server(router, vec![]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        let base = server.base_token().clone();
        server.register_on_shutdown(move || seen.lock().unwrap().push(base.is_cancelled()));
    }

    let running = common::start(server, Duration::from_secs(1)).await;
    running.stop().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![true]);
}

#[tokio::test]
async fn bind_failure_ends_runner() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let router = Router::new().route("/", get(|| async { "ok" }));
    let server = Server::new(
        &CancellationToken::new(),
        Some(router),
        [with_host("127.0.0.1"), with_port(port as i64)],
    )
    .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        server.clone().start_until(std::future::pending(), Duration::from_secs(1)),
    )
    .await
    .expect("runner should not wait for a signal after a bind failure");

    assert!(matches!(result, Err(ShutdownError::Serve(ServeError::Bind { .. }))));
    assert_eq!(server.state(), LifecycleState::Stopped);
    assert_eq!(server.local_addr().await, None);
}

#[tokio::test]
async fn parent_cancel_reaches_base_token() {
    let parent = CancellationToken::new();
    let router = Router::new().route("/", get(|| async { "ok" }));
    let server = Server::new(&parent, Some(router), [with_port(0)]).unwrap();

    assert!(!server.base_token().is_cancelled());
    parent.cancel();
    assert!(server.base_token().is_cancelled());
}

#[tokio::test]
async fn close_drops_connections_immediately() {
    let entered = Arc::new(Notify::new());
    let router = slow_router(entered.clone(), Duration::from_secs(5));
    let running = common::start(common::local_server(router, vec![]), Duration::from_secs(5)).await;

    let url = running.url("/slow");
    let request = tokio::spawn(async move { common::client().get(url).send().await });
    entered.notified().await;

    running.server.close();
    assert_eq!(running.server.state(), LifecycleState::Stopped);

    let response = tokio::time::timeout(Duration::from_secs(2), request)
        .await
        .expect("close should cut the request")
        .unwrap();
    assert!(response.is_err());

    // The accept loop ended through `close`, so the runner returns on its own.
    let result = tokio::time::timeout(Duration::from_secs(2), running.wait())
        .await
        .expect("runner should return after close");
    assert!(result.is_ok());
}
