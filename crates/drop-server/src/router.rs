use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all drop endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/campaigns/:campaign/info", get(handler::info_handler))
        .route("/v1/campaigns/:campaign/check", post(handler::check_handler))
        .route("/v1/campaigns/:campaign/claim", post(handler::claim_handler))
        .route("/v1/campaigns/:campaign/reset", post(handler::reset_handler))
        .route("/v1/campaigns/:campaign/resync", post(handler::resync_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
