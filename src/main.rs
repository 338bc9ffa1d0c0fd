use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use swarm_latency::config::Cli;
use swarm_latency::{handlers, server, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── 1. Logging ───────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("swarm_latency=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── 2. Config ────────────────────────────────────────────────
    let cli = Cli::parse();

    // ── 3. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState::new());

    if cli.autostart {
        handlers::swarm::launch(&state, cli.swarm.clone()).await?;
    }

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(cli.listen).await?;

    info!(addr = %cli.listen, "server listening");
    info!("Fleet JSON   → http://{}/api/fleet", cli.listen);
    info!("Fleet SSE    → http://{}/api/fleet/stream", cli.listen);
    info!("Start swarm  → POST http://{}/api/swarm/start", cli.listen);

    axum::serve(listener, app).await?;
    Ok(())
}
