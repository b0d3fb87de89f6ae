//! Note Server
//!
//! Small HTTP service for creating, reading, updating and listing text notes.
//! Storage is pluggable: in-memory, Redis, or Google Cloud Storage, chosen by
//! the `BACKEND` environment variable the first time a request needs it.

mod config;
mod error;
mod extractors;
mod handlers;
mod storage;
mod telemetry;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use config::{Config, TelemetryConfig};
use storage::BackendSelector;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub selector: Arc<BackendSelector>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    let telemetry_config = TelemetryConfig::from_env();
    if let Err(e) = telemetry::init(&telemetry_config) {
        eprintln!("[FATAL] Failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    // Route panics through the log pipeline
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    info!("Starting Note Server v{}", env!("CARGO_PKG_VERSION"));
    match &telemetry_config.otlp_endpoint {
        Some(endpoint) => info!("Exporting traces to {}", endpoint),
        None => info!("OTLP_ENDPOINT not set, trace export disabled"),
    }

    let config = Config::from_env();
    let result = run_server(config).await;

    // Flush buffered spans before exiting
    telemetry::shutdown();

    if let Err(e) = result {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server(config: Config) -> Result<()> {
    info!(
        "Config loaded: bind={}, backend={}",
        config.bind_address,
        config.backend.backend.as_deref().unwrap_or("memory")
    );

    // Backend is built lazily by the first request that needs it
    let selector = Arc::new(BackendSelector::new(config.backend.clone()));
    let app = build_router(AppState { selector });

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server ready to accept connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::notes::root))
        .route("/health", get(handlers::health))
        .route(
            "/notes",
            get(handlers::notes::list).post(handlers::notes::create),
        )
        .route(
            "/notes/:id",
            get(handlers::notes::get).put(handlers::notes::update),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
