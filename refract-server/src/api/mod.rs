//! API Module
//!
//! HTTP API layer for the server.
//! Each submodule handles endpoints for a specific domain.

pub mod asset;
pub mod capabilities;
pub mod error;
pub mod health;
pub mod metrics;
pub mod ping;
pub mod process;
pub mod protocol;
pub mod session;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Server endpoints
        .route("/health", get(health::health_check))
        .route("/capabilities", get(capabilities::get_capabilities))
        .route("/metrics", get(metrics::get_metrics))
        .route("/ping", get(ping::ping))
        // Session endpoints
        .route("/session", post(session::create_session))
        .route(
            "/session/{id}",
            get(session::get_session).delete(session::delete_session),
        )
        .route("/session/{id}/state", put(session::update_state))
        .route("/session/{id}/stop", post(session::stop_session))
        .route("/session/{id}/process", get(process::process_session))
        // Asset endpoints
        .route(
            "/session/{id}/assets",
            post(asset::upload_asset)
                .get(asset::list_assets)
                .delete(asset::delete_assets),
        )
        .route("/session/{id}/assets/{asset_id}", get(asset::get_asset))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
