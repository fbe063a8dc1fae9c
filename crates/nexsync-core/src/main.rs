//! nexsync - Schema-driven record sync and FK cascade engine
//!
//! Serves sync triggers over HTTP. Records are read from the data
//! directory, embedded, and written to the shared Qdrant collection.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anyhow::Context;
use nexsync_core::{api, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first so logging can honor LOG_FORMAT
    let config = config::init();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nexsync=debug,tower_http=debug".into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        "Starting nexsync server on {}:{}",
        config.server.host,
        config.server.port
    );

    let state = AppState::new()
        .await
        .context("Failed to initialize application state")?;
    tracing::info!(
        batch_size = state.engine.batch_size(),
        data_dir = %config.sync.data_dir.display(),
        schema = %config.sync.schema_path.display(),
        "Application state initialized"
    );

    // Build router
    let app = Router::new()
        .merge(api::routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid HOST/PORT")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
