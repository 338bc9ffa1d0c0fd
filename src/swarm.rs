use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::client::{ClientStats, ClientStatsSnapshot};
use crate::config::SwarmRequest;
use crate::correlator::ResourceKind;
use crate::fleet::{FleetBoard, FleetSnapshot};
use crate::metrics::ns_to_ms;

/// Chance that a segment step prefetches two segments at once.
const PREFETCH_PCT: u8 = 10;

/// Chance of a slow outlier, and how much slower it is.
const OUTLIER_PCT: u8 = 2;
const OUTLIER_FACTOR: f64 = 6.0;

// ─── Collector ───────────────────────────────────────────────────

/// Central collection point: latest snapshot per client plus the
/// published fleet snapshot. Never touches a live tracker.
pub struct SwarmCollector {
    clients: RwLock<HashMap<String, ClientStatsSnapshot>>,
    fleet: FleetBoard,
}

impl SwarmCollector {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            fleet: FleetBoard::new(),
        }
    }

    /// Store a client's snapshot, replacing its previous one.
    pub fn accept(&self, snapshot: ClientStatsSnapshot) {
        self.clients
            .write()
            .insert(snapshot.client_id.clone(), snapshot);
    }

    /// Rebuild and publish the fleet snapshot from the current inbox.
    pub fn aggregate(&self) -> Arc<FleetSnapshot> {
        let clients = self.clients.read();
        self.fleet.refresh(clients.values())
    }

    pub fn fleet(&self) -> Arc<FleetSnapshot> {
        self.fleet.latest()
    }

    /// Latest per-client snapshots, sorted by client id.
    pub fn clients(&self) -> Vec<ClientStatsSnapshot> {
        let mut out: Vec<_> = self.clients.read().values().cloned().collect();
        out.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        out
    }

    /// Wipe everything, called when a new swarm run starts.
    pub fn reset(&self) {
        self.clients.write().clear();
        self.fleet.clear();
    }
}

impl Default for SwarmCollector {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `req.clients` simulated streaming clients plus the collector
/// loop, and returns once the deadline passes or `running` is cleared.
pub async fn run(running: Arc<AtomicBool>, collector: Arc<SwarmCollector>, req: SwarmRequest) {
    let deadline = Instant::now() + req.duration();
    let (tx, rx) = mpsc::channel::<ClientStatsSnapshot>((req.clients as usize * 2).max(1));

    info!(
        clients = req.clients,
        duration_secs = req.duration_secs,
        lost_start_pct = req.lost_start_pct,
        "swarm starting"
    );

    let aggregator = tokio::spawn(collect(rx, collector.clone(), req.aggregate_interval()));

    let mut handles = Vec::with_capacity(req.clients as usize);
    for client_id in 0..req.clients {
        let running = running.clone();
        let tx = tx.clone();
        let req = req.clone();

        handles.push(tokio::spawn(async move {
            client_worker(client_id, running, tx, deadline, req).await;
        }));
    }
    // Only workers hold senders now; the collector stops when they finish
    drop(tx);

    for h in handles {
        let _ = h.await;
    }
    let _ = aggregator.await;

    running.store(false, Ordering::SeqCst);

    let fleet = collector.fleet();
    info!(
        clients = fleet.clients,
        segments = fleet.segment.latency.count,
        segment_p99_ms = ns_to_ms(fleet.segment.latency.p99),
        manifest_p99_ms = ns_to_ms(fleet.manifest.latency.p99),
        unmatched = fleet.segment.unmatched + fleet.manifest.unmatched,
        "swarm finished"
    );
}

// ─── Collector loop ──────────────────────────────────────────────

async fn collect(
    mut rx: mpsc::Receiver<ClientStatsSnapshot>,
    collector: Arc<SwarmCollector>,
    every: Duration,
) {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(snapshot) => collector.accept(snapshot),
                None => break,
            },
            _ = tick.tick() => {
                let fleet = collector.aggregate();
                trace!(clients = fleet.clients, "fleet snapshot rebuilt");
            }
        }
    }

    // Final pass so the last published snapshots are reflected
    collector.aggregate();
}

// ─── Client worker ───────────────────────────────────────────────

async fn client_worker(
    id: u32,
    running: Arc<AtomicBool>,
    tx: mpsc::Sender<ClientStatsSnapshot>,
    deadline: Instant,
    req: SwarmRequest,
) {
    let stats = Arc::new(ClientStats::new(format!("client-{id:05}"), &req.tracker));

    // Publisher runs beside the traffic loop, snapshotting while it ingests
    let publisher = {
        let stats = stats.clone();
        let running = running.clone();
        let tx = tx.clone();
        let every = req.publish_interval();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            while running.load(Ordering::Relaxed) && Instant::now() < deadline {
                tick.tick().await;
                if tx.send(stats.snapshot()).await.is_err() {
                    break;
                }
            }
        })
    };

    // Each client gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);
    let mut next_manifest = Instant::now();

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        if Instant::now() >= next_manifest {
            fetch(&stats, &mut rng, ResourceKind::Manifest, req.manifest_latency_ms, req.lost_start_pct).await;
            next_manifest = Instant::now() + req.manifest_interval();
        }

        if rng.gen_range(0u8..100) < PREFETCH_PCT {
            prefetch_pair(&stats, &mut rng, req.segment_latency_ms).await;
        } else {
            fetch(&stats, &mut rng, ResourceKind::Segment, req.segment_latency_ms, req.lost_start_pct).await;
        }
    }

    let _ = publisher.await;
    // Closing snapshot so the collector sees the final counts
    let _ = tx.send(stats.snapshot()).await;
    debug!(client = stats.id(), "client finished");
}

/// One request: start event, simulated wait, completion event.
async fn fetch(
    stats: &ClientStats,
    rng: &mut StdRng,
    kind: ResourceKind,
    median_ms: u64,
    lost_start_pct: u8,
) {
    let latency = draw_latency(rng, median_ms);

    // A lost start leaves the completion unmatched upstream
    if rng.gen_range(0u8..100) >= lost_start_pct {
        stats.on_start(kind, Instant::now());
    }
    tokio::time::sleep(latency).await;
    stats.on_complete(kind, Instant::now());
}

/// Two overlapping segment requests; responses come back in request order.
async fn prefetch_pair(stats: &ClientStats, rng: &mut StdRng, median_ms: u64) {
    let first = draw_latency(rng, median_ms);
    let second = draw_latency(rng, median_ms).max(first);

    stats.on_start(ResourceKind::Segment, Instant::now());
    stats.on_start(ResourceKind::Segment, Instant::now());
    tokio::time::sleep(first).await;
    stats.on_complete(ResourceKind::Segment, Instant::now());
    tokio::time::sleep(second - first).await;
    stats.on_complete(ResourceKind::Segment, Instant::now());
}

/// Skewed latency around `median_ms`, with occasional slow outliers.
fn draw_latency(rng: &mut StdRng, median_ms: u64) -> Duration {
    let base = median_ms as f64 * rng.gen_range(0.5..1.5);
    let ms = if rng.gen_range(0u8..100) < OUTLIER_PCT {
        base * OUTLIER_FACTOR
    } else {
        base
    };
    Duration::from_secs_f64(ms / 1_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::ResourceSnapshot;
    use crate::metrics::PercentileSet;
    use chrono::Utc;

    fn snapshot(id: &str, count: u64) -> ClientStatsSnapshot {
        ClientStatsSnapshot {
            client_id: id.into(),
            taken_at: Utc::now(),
            segment: ResourceSnapshot {
                latency: PercentileSet {
                    count,
                    mean: 1.0,
                    min: 1,
                    max: 1,
                    p25: 1,
                    p50: 1,
                    p75: 1,
                    p95: 1,
                    p99: 1,
                },
                ..ResourceSnapshot::empty()
            },
            manifest: ResourceSnapshot::empty(),
        }
    }

    #[test]
    fn collector_keeps_latest_per_client() {
        let collector = SwarmCollector::new();
        collector.accept(snapshot("a", 1));
        collector.accept(snapshot("a", 5));
        collector.accept(snapshot("b", 2));

        let fleet = collector.aggregate();
        assert_eq!(fleet.clients, 2);
        assert_eq!(fleet.segment.latency.count, 7);
        assert_eq!(collector.clients().len(), 2);

        collector.reset();
        assert_eq!(collector.fleet().clients, 0);
        assert!(collector.clients().is_empty());
    }

    #[test]
    fn latency_draws_stay_in_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let d = draw_latency(&mut rng, 100);
            assert!(d >= Duration::from_millis(50));
            assert!(d <= Duration::from_millis(900));
        }
    }

    #[tokio::test]
    async fn short_swarm_publishes_fleet() {
        let running = Arc::new(AtomicBool::new(true));
        let collector = Arc::new(SwarmCollector::new());
        let req = SwarmRequest {
            clients: 4,
            duration_secs: 1,
            segment_latency_ms: 5,
            manifest_latency_ms: 2,
            manifest_interval_ms: 100,
            publish_interval_ms: 50,
            aggregate_interval_ms: 50,
            lost_start_pct: 10,
            ..SwarmRequest::default()
        };

        run(running.clone(), collector.clone(), req).await;

        assert!(!running.load(Ordering::SeqCst));
        let fleet = collector.fleet();
        assert_eq!(fleet.clients, 4);
        assert!(fleet.segment.latency.has_data());
        assert!(fleet.manifest.latency.has_data());
        let p = fleet.segment.latency;
        assert!(p.p25 <= p.p50 && p.p50 <= p.p75 && p.p75 <= p.p95 && p.p95 <= p.p99);
        assert!(p.min <= p.max);
    }
}
