//! Pairs start and completion notifications into elapsed-time samples.
//!
//! Upstream log lines carry no request identifier, so each completion is
//! matched to the oldest outstanding start of the same resource kind. This
//! is an approximation: if responses can overtake each other, the pairing
//! (though not the sample count) is wrong.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::metrics::{MetricTracker, PercentileSet, TrackerConfig};

/// The two request streams a streaming client produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Segment,
    Manifest,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Segment, ResourceKind::Manifest];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segment => f.write_str("segment"),
            Self::Manifest => f.write_str("manifest"),
        }
    }
}

/// Correlation state for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelatorState {
    Idle,
    Pending(usize),
}

/// Copy-out view of one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub latency: PercentileSet,
    /// Completions discarded because no start was outstanding.
    pub unmatched: u64,
    /// Oldest starts dropped because the pending queue was full.
    pub evicted: u64,
    /// Starts still waiting for a completion.
    pub in_flight: u64,
}

impl ResourceSnapshot {
    pub fn empty() -> Self {
        Self {
            latency: PercentileSet::empty(),
            unmatched: 0,
            evicted: 0,
            in_flight: 0,
        }
    }
}

// ─── Per-kind queue ──────────────────────────────────────────────

/// FIFO of outstanding starts plus the tracker their samples feed.
/// The queue and the tracker have separate locks and are never held together.
struct KindCorrelator {
    pending: Mutex<VecDeque<Instant>>,
    max_pending: usize,
    tracker: MetricTracker,
    unmatched: AtomicU64,
    evicted: AtomicU64,
}

impl KindCorrelator {
    fn new(config: &TrackerConfig) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            max_pending: config.max_pending.max(1),
            tracker: MetricTracker::new(config),
            unmatched: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    fn start(&self, at: Instant) {
        let mut pending = self.pending.lock();
        if pending.len() >= self.max_pending {
            pending.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        pending.push_back(at);
    }

    fn complete(&self, at: Instant) -> Option<Duration> {
        // Pop under the queue lock, ingest after releasing it
        let started = self.pending.lock().pop_front();

        let Some(started) = started else {
            self.unmatched.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        // Out-of-order timestamps clamp to zero
        let elapsed = at.saturating_duration_since(started);
        self.tracker.ingest(elapsed);
        Some(elapsed)
    }

    fn state(&self) -> CorrelatorState {
        match self.pending.lock().len() {
            0 => CorrelatorState::Idle,
            n => CorrelatorState::Pending(n),
        }
    }

    fn snapshot(&self) -> ResourceSnapshot {
        let in_flight = self.pending.lock().len() as u64;
        ResourceSnapshot {
            latency: self.tracker.snapshot(),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            in_flight,
        }
    }
}

// ─── Public correlator ───────────────────────────────────────────

/// One client's correlator: an independent queue and tracker per kind.
pub struct EventCorrelator {
    segment: KindCorrelator,
    manifest: KindCorrelator,
}

impl EventCorrelator {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            segment: KindCorrelator::new(config),
            manifest: KindCorrelator::new(config),
        }
    }

    fn kind(&self, kind: ResourceKind) -> &KindCorrelator {
        match kind {
            ResourceKind::Segment => &self.segment,
            ResourceKind::Manifest => &self.manifest,
        }
    }

    /// A request for `kind` was issued at `at`.
    pub fn on_start(&self, kind: ResourceKind, at: Instant) {
        self.kind(kind).start(at);
    }

    /// A request for `kind` finished at `at`. Returns the sample fed to the
    /// tracker, or `None` if there was no outstanding start to match.
    pub fn on_complete(&self, kind: ResourceKind, at: Instant) -> Option<Duration> {
        self.kind(kind).complete(at)
    }

    pub fn state(&self, kind: ResourceKind) -> CorrelatorState {
        self.kind(kind).state()
    }

    pub fn tracker(&self, kind: ResourceKind) -> &MetricTracker {
        &self.kind(kind).tracker
    }

    pub fn snapshot(&self, kind: ResourceKind) -> ResourceSnapshot {
        self.kind(kind).snapshot()
    }
}

impl Default for EventCorrelator {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}
