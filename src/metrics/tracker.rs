use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;

use super::percentiles::PercentileSet;
use super::sketch::{QuantileSketch, DEFAULT_COMPRESSION};

// ─── Configuration ───────────────────────────────────────────────

/// How many individual samples we keep for the diagnostic ring
const DEFAULT_RECENT_CAPACITY: usize = 64;

/// Upper bound on outstanding starts per resource kind
const DEFAULT_MAX_PENDING: usize = 4096;

/// Tuning knobs shared by every tracker and correlator of one client.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_compression")]
    pub compression: f64,

    /// Last-K ring size; 0 disables the ring.
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,

    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

fn default_compression() -> f64 {
    DEFAULT_COMPRESSION
}
fn default_recent_capacity() -> usize {
    DEFAULT_RECENT_CAPACITY
}
fn default_max_pending() -> usize {
    DEFAULT_MAX_PENDING
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            recent_capacity: default_recent_capacity(),
            max_pending: default_max_pending(),
        }
    }
}

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe latency tracker for one metric of one client.
/// The correlator calls `ingest()`, whoever publishes calls `snapshot()`.
pub struct MetricTracker {
    inner: Mutex<Inner>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    // Exact running fields
    count: u64,
    sum_ns: u128,
    min_ns: u64,
    max_ns: u64,

    sketch: QuantileSketch,

    // Rolling window of the most recent samples
    recent: VecDeque<Duration>,
    recent_capacity: usize,
}

// ─── MetricTracker impl ──────────────────────────────────────────

impl MetricTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::new(config)),
        }
    }

    /// Record one elapsed duration. Never fails, never blocks beyond the
    /// tracker's own short critical section.
    pub fn ingest(&self, elapsed: Duration) {
        self.inner.lock().ingest(elapsed);
    }

    /// Copy out a consistent view. No ingest can interleave with it.
    pub fn snapshot(&self) -> PercentileSet {
        self.inner.lock().snapshot()
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    pub fn has_data(&self) -> bool {
        self.count() > 0
    }

    /// Most recent samples, oldest first.
    pub fn recent(&self) -> Vec<Duration> {
        self.inner.lock().recent.iter().copied().collect()
    }
}

impl Default for MetricTracker {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new(config: &TrackerConfig) -> Self {
        Self {
            count: 0,
            sum_ns: 0,
            min_ns: 0,
            max_ns: 0,
            sketch: QuantileSketch::new(config.compression),
            recent: VecDeque::with_capacity(config.recent_capacity),
            recent_capacity: config.recent_capacity,
        }
    }

    fn ingest(&mut self, elapsed: Duration) {
        // Saturate rather than wrap: u64 nanoseconds covers ~584 years
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        // ── Exact fields ────────────────────────────────────────
        if self.count == 0 {
            self.min_ns = ns;
            self.max_ns = ns;
        } else {
            self.min_ns = self.min_ns.min(ns);
            self.max_ns = self.max_ns.max(ns);
        }
        self.count += 1;
        self.sum_ns += u128::from(ns);

        // ── Sketch ──────────────────────────────────────────────
        self.sketch.ingest(ns as f64);

        // ── Diagnostic ring ─────────────────────────────────────
        if self.recent_capacity > 0 {
            if self.recent.len() == self.recent_capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(elapsed);
        }
    }

    fn snapshot(&mut self) -> PercentileSet {
        PercentileSet::from_parts(
            self.count,
            self.sum_ns,
            self.min_ns,
            self.max_ns,
            &mut self.sketch,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn empty_tracker_snapshot_is_zeroed() {
        let tracker = MetricTracker::default();
        let snap = tracker.snapshot();
        assert!(!snap.has_data());
        assert_eq!(snap.mean, 0.0);
        assert_eq!(snap, PercentileSet::empty());
    }

    #[test]
    fn exact_fields_are_exact() {
        let tracker = MetricTracker::default();
        for v in [30, 10, 50, 20, 40] {
            tracker.ingest(ms(v));
        }
        let snap = tracker.snapshot();
        assert_eq!(snap.count, 5);
        assert_eq!(snap.min, 10_000_000);
        assert_eq!(snap.max, 50_000_000);
        assert_eq!(snap.mean, 30_000_000.0);
    }

    #[test]
    fn first_sample_sets_min_even_when_large() {
        let tracker = MetricTracker::default();
        tracker.ingest(ms(900));
        assert_eq!(tracker.snapshot().min, 900_000_000);
        tracker.ingest(Duration::ZERO);
        assert_eq!(tracker.snapshot().min, 0);
    }

    #[test]
    fn hundred_samples_percentiles() {
        let tracker = MetricTracker::default();
        for v in 1..=100 {
            tracker.ingest(ms(v));
        }
        let snap = tracker.snapshot();
        let p50_ms = snap.p50 as f64 / 1e6;
        let p99_ms = snap.p99 as f64 / 1e6;
        assert!((p50_ms - 50.0).abs() <= 2.0, "p50={p50_ms}");
        assert!((p99_ms - 99.0).abs() <= 1.5, "p99={p99_ms}");
        assert!(snap.p25 <= snap.p50 && snap.p50 <= snap.p75);
        assert!(snap.p75 <= snap.p95 && snap.p95 <= snap.p99);
    }

    #[test]
    fn recent_ring_overwrites_oldest() {
        let config = TrackerConfig {
            recent_capacity: 3,
            ..TrackerConfig::default()
        };
        let tracker = MetricTracker::new(&config);
        for v in 1..=5 {
            tracker.ingest(ms(v));
        }
        assert_eq!(tracker.recent(), vec![ms(3), ms(4), ms(5)]);
        assert_eq!(tracker.count(), 5);
    }

    #[test]
    fn zero_capacity_ring_stays_empty() {
        let config = TrackerConfig {
            recent_capacity: 0,
            ..TrackerConfig::default()
        };
        let tracker = MetricTracker::new(&config);
        tracker.ingest(ms(1));
        assert!(tracker.recent().is_empty());
        assert!(tracker.has_data());
    }
}
