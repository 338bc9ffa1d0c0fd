use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use crate::client::ClientStatsSnapshot;
use crate::fleet::FleetSnapshot;
use crate::handlers::AppError;
use crate::AppState;

/// SSE push cadence
const STREAM_INTERVAL_MS: u64 = 1_000;

// ─── GET /api/fleet ──────────────────────────────────────────────
/// Returns the latest fleet snapshot — useful for curl / debugging.

pub async fn get_fleet(State(state): State<Arc<AppState>>) -> Json<FleetSnapshot> {
    Json(state.collector.fleet().as_ref().clone())
}

// ─── GET /api/clients ────────────────────────────────────────────

pub async fn get_clients(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ClientStatsSnapshot>> {
    Json(state.collector.clients())
}

// ─── GET /api/clients/:id ────────────────────────────────────────

pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClientStatsSnapshot>, AppError> {
    state
        .collector
        .clients()
        .into_iter()
        .find(|c| c.client_id == id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no snapshot for client {id}")))
}

// ─── GET /api/fleet/stream ───────────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes the latest `FleetSnapshot` as JSON once per second.

pub async fn fleet_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_millis(STREAM_INTERVAL_MS));

    let stream = IntervalStream::new(interval).map(move |_| {
        let fleet = state.collector.fleet();
        let json = serde_json::to_string(fleet.as_ref()).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
