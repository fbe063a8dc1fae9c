//! Sync Routes
//!
//! Routes:
//! - POST /sync - Sync every model with a data file (no cascade)
//! - POST /sync/:model - Sync one model; body is an optional `SyncOptions`
//!
//! A sync that ran but hit errors still answers 200; the outcome is in the
//! returned `SyncResult`.

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use nexsync_models::{SyncOptions, SyncResult};
use tracing::info;

use crate::{AppState, Result};

/// Build sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(sync_all))
        .route("/:model", post(sync_model))
}

/// Sync one model and its FK targets.
///
/// POST /sync/:model
async fn sync_model(
    State(state): State<AppState>,
    Path(model): Path<String>,
    body: Bytes,
) -> Result<Json<SyncResult>> {
    let options: SyncOptions = if body.iter().all(u8::is_ascii_whitespace) {
        SyncOptions::default()
    } else {
        serde_json::from_slice(&body)?
    };

    info!(model = %model, "Sync requested");
    Ok(Json(state.engine.sync(&model, options).await))
}

/// Sync every discovered model.
///
/// POST /sync
async fn sync_all(State(state): State<AppState>) -> Result<Json<Vec<SyncResult>>> {
    info!("Sync of all models requested");
    Ok(Json(state.engine.sync_all().await?))
}
