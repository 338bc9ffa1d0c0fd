use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Swarm control ───────────────────────────────────────
        .route("/api/swarm/start", post(handlers::swarm::start_swarm))
        .route("/api/swarm/stop", post(handlers::swarm::stop_swarm))
        .route("/api/swarm/status", get(handlers::swarm::swarm_status))
        // ── Snapshots ───────────────────────────────────────────
        .route("/api/fleet", get(stream::get_fleet))
        .route("/api/fleet/stream", get(stream::fleet_stream))
        .route("/api/clients", get(stream::get_clients))
        .route("/api/clients/:id", get(stream::get_client))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(CorsLayer::permissive())
}
