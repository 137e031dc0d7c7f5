//! API endpoints.

mod health;
mod messages;

use axum::Router;

use crate::state::AppState;

/// Create the versioned API router.
pub fn router() -> Router<AppState> {
    Router::new().nest("/messages", messages::router())
}

/// Create the liveness router.
pub fn health_router() -> Router<AppState> {
    health::router()
}
