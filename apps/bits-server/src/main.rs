//! BITS Server
//!
//! Accepts resumable uploads from BITS clients and moves every completed
//! file into a storage root.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bits_server::placement::FilePlacer;
use bits_server::{routes, AppState, BitsHandler, Config};

/// How often stale session locks are swept
const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "bits_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting BITS Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Upload URI: {}", config.server.uri);
    tracing::info!("Storage root: {}", config.server.root.display());

    let placer = FilePlacer::new(&config.server.root)?;
    let handler = BitsHandler::new(config.bits.clone(), Arc::new(placer))
        .context("Failed to initialize BITS handler")?;
    tracing::info!("Temp directory: {}", handler.config().temp_dir.display());

    let _prune_task = handler.sessions().clone().start_prune_task(PRUNE_INTERVAL);

    let app_state = AppState::new(config.clone(), handler);
    let app = routes::app(app_state).layer(TraceLayer::new_for_http());

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("BITS Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
