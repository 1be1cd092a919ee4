//! Axum routers for the two HTTP-facing listeners.
//!
//! The WebSocket listener upgrades on `/`. The asset listener serves
//! `static_dir`, redirects `/` to the viewer page and hosts the ops endpoints.

use axum::{routing::get, Router};
use tower_http::services::ServeDir;

use crate::{app_state::AppState, ops, transport};

pub fn build_ws_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(transport::ws::ws_upgrade))
        .with_state(state)
}

pub fn build_http_router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.cfg().bridge.static_dir);
    Router::new()
        .route("/", get(ops::index_redirect))
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .fallback_service(assets)
        .with_state(state)
}
