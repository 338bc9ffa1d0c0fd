use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SwarmRequest;
use crate::AppState;

use super::AppError;

// ─── Response types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SwarmStatus {
    pub running: bool,
    pub message: String,
}

// ─── POST /api/swarm/start ───────────────────────────────────────

pub async fn start_swarm(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SwarmRequest>,
) -> Result<Json<SwarmStatus>, AppError> {
    let message = launch(&state, req).await?;
    Ok(Json(SwarmStatus {
        running: true,
        message,
    }))
}

/// Validate, reset and spawn a swarm run. Shared by the HTTP handler and
/// `--autostart`.
pub async fn launch(state: &Arc<AppState>, req: SwarmRequest) -> Result<String, AppError> {
    // Guard: only one swarm at a time
    if state.swarm_running.load(Ordering::SeqCst) {
        return Err(AppError::AlreadyRunning);
    }

    if let Err(e) = req.validate() {
        warn!(error = %e, "rejected swarm request");
        return Err(e.into());
    }

    // Fresh collector state for a clean run
    state.collector.reset();

    // Flip the flag BEFORE spawning so workers see it immediately
    state.swarm_running.store(true, Ordering::SeqCst);

    let msg = format!(
        "Started: {} clients × {}s, segment ~{}ms, manifest ~{}ms every {}ms",
        req.clients,
        req.duration_secs,
        req.segment_latency_ms,
        req.manifest_latency_ms,
        req.manifest_interval_ms,
    );
    info!("{msg}");

    let running = state.swarm_running.clone();
    let collector = state.collector.clone();
    let handle = tokio::spawn(async move {
        crate::swarm::run(running, collector, req).await;
    });

    // Stash the handle so `stop` can await clean shutdown
    let mut guard = state.swarm_handle.lock().await;
    *guard = Some(handle);

    Ok(msg)
}

// ─── POST /api/swarm/stop ────────────────────────────────────────

pub async fn stop_swarm(State(state): State<Arc<AppState>>) -> Json<SwarmStatus> {
    if !state.swarm_running.load(Ordering::SeqCst) {
        return Json(SwarmStatus {
            running: false,
            message: "No swarm is running".into(),
        });
    }

    // Signal all clients to stop
    state.swarm_running.store(false, Ordering::SeqCst);

    let mut guard = state.swarm_handle.lock().await;
    if let Some(handle) = guard.take() {
        // Ignore JoinError — the task may have already finished
        let _ = handle.await;
    }
    info!("swarm stopped on request");

    Json(SwarmStatus {
        running: false,
        message: "Swarm stopped".into(),
    })
}

// ─── GET /api/swarm/status ───────────────────────────────────────

pub async fn swarm_status(State(state): State<Arc<AppState>>) -> Json<SwarmStatus> {
    let running = state.swarm_running.load(Ordering::SeqCst);
    Json(SwarmStatus {
        running,
        message: if running {
            "Swarm in progress".into()
        } else {
            "Idle".into()
        },
    })
}
