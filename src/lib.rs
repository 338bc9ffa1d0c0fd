//! Latency-percentile tracking for a swarm of simulated streaming clients.
//!
//! Per client, start/complete notifications for segments and manifests are
//! paired FIFO by [`correlator::EventCorrelator`] into samples that feed a
//! [`metrics::MetricTracker`] (exact count/sum/min/max plus a bounded
//! [`metrics::QuantileSketch`]). Clients hand out immutable
//! [`client::ClientStatsSnapshot`]s, which [`fleet::FleetAggregator`] folds
//! into one worst-case [`fleet::FleetSnapshot`].

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub mod client;
pub mod config;
pub mod correlator;
pub mod fleet;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod swarm;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Latest client snapshots and the published fleet snapshot.
    pub collector: Arc<swarm::SwarmCollector>,

    /// Flag checked by every simulated client on each iteration.
    pub swarm_running: Arc<AtomicBool>,

    /// Handle to the spawned swarm task so we can await clean shutdown.
    pub swarm_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            collector: Arc::new(swarm::SwarmCollector::new()),
            swarm_running: Arc::new(AtomicBool::new(false)),
            swarm_handle: tokio::sync::Mutex::new(None),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
