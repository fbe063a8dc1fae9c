//! API Routes for nexsync
//!
//! This module combines all API routes into a single router.

pub mod status;
mod sync;

use axum::Router;

use crate::AppState;

/// Build the complete API router.
///
/// Route structure:
/// - /health - Health check
/// - /sync, /sync/:model - Sync triggers
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(status::routes())
        .nest("/sync", sync::routes())
}
