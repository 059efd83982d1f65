//! graceful-server
//!
//! Demo binary: serves a small axum router until a termination signal
//! arrives, then drains connections within the stop timeout.
//!
//! Options are built from the config file first and the command line
//! second, so a flag overrides the same setting from the file.

use std::path::PathBuf;
use std::time::Duration;

use axum::extract::{Extension, Path};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use graceful_server::config::loader::load_config;
use graceful_server::config::{with_host, with_port, AppConfig, ServerOption};
use graceful_server::observability::logging::{init_logging, LogFormat};
use graceful_server::Server;

#[derive(Parser)]
#[command(name = "graceful-server")]
#[command(about = "HTTP server with graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to listen on (empty for all interfaces)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (0 picks a free port)
    #[arg(short, long, allow_negative_numbers = true)]
    port: Option<i64>,

    /// Milliseconds allowed for in-flight requests on shutdown
    #[arg(long)]
    stop_timeout_ms: Option<u64>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn options(&self) -> Vec<ServerOption> {
        let mut options = Vec::new();
        if let Some(host) = &self.host {
            options.push(with_host(host.clone()));
        }
        if let Some(port) = self.port {
            options.push(with_port(port));
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(ms) = cli.stop_timeout_ms {
        config.shutdown.stop_timeout_ms = ms;
    }

    init_logging(&config.logging)?;
    tracing::info!("graceful-server v{} starting", env!("CARGO_PKG_VERSION"));

    let mut options = config.server.options();
    options.extend(cli.options());

    let server = Server::new(&CancellationToken::new(), Some(app()), options)?;
    tracing::info!(
        address = %server.addr(),
        stop_timeout = ?config.shutdown.stop_timeout(),
        "Configuration loaded"
    );

    server
        .start_with_await_stop(config.shutdown.stop_timeout())
        .await?;

    tracing::info!("Exited cleanly");
    Ok(())
}

fn app() -> Router {
    Router::new()
        .route("/", get(|| async { "ok\n" }))
        .route("/sleep/{ms}", get(sleep))
        .layer(TraceLayer::new_for_http())
}

/// Sleep for `ms` milliseconds, returning early if the server shuts down.
async fn sleep(Path(ms): Path<u64>, Extension(token): Extension<CancellationToken>) -> String {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => format!("slept {ms}ms\n"),
        _ = token.cancelled() => "interrupted by shutdown\n".to_string(),
    }
}
