use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::client::ClientStatsSnapshot;
use crate::correlator::{ResourceKind, ResourceSnapshot};
use crate::metrics::PercentileSet;

/// Fleet-wide view, same shape as a client snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Number of client snapshots folded into this one.
    pub clients: usize,
    pub segment: ResourceSnapshot,
    pub manifest: ResourceSnapshot,
}

impl FleetSnapshot {
    pub fn empty() -> Self {
        Self {
            generated_at: Utc::now(),
            clients: 0,
            segment: ResourceSnapshot::empty(),
            manifest: ResourceSnapshot::empty(),
        }
    }

    pub fn resource(&self, kind: ResourceKind) -> &ResourceSnapshot {
        match kind {
            ResourceKind::Segment => &self.segment,
            ResourceKind::Manifest => &self.manifest,
        }
    }
}

/// Stateless fold of client snapshots into a fleet snapshot.
pub struct FleetAggregator;

impl FleetAggregator {
    /// Percentiles take the worst client per point (see
    /// `PercentileSet::combine`); counters sum.
    pub fn combine<'a, I>(snapshots: I) -> FleetSnapshot
    where
        I: IntoIterator<Item = &'a ClientStatsSnapshot>,
        I::IntoIter: Clone,
    {
        let snapshots = snapshots.into_iter();
        FleetSnapshot {
            generated_at: Utc::now(),
            clients: snapshots.clone().count(),
            segment: combine_resource(snapshots.clone().map(|s| &s.segment)),
            manifest: combine_resource(snapshots.map(|s| &s.manifest)),
        }
    }
}

fn combine_resource<'a, I>(resources: I) -> ResourceSnapshot
where
    I: Iterator<Item = &'a ResourceSnapshot> + Clone,
{
    let mut out = ResourceSnapshot {
        latency: PercentileSet::combine(resources.clone().map(|r| &r.latency)),
        ..ResourceSnapshot::empty()
    };
    for r in resources {
        out.unmatched += r.unmatched;
        out.evicted += r.evicted;
        out.in_flight += r.in_flight;
    }
    out
}

// ─── Publication ─────────────────────────────────────────────────

/// Holds the most recent fleet snapshot. Each refresh swaps in a whole new
/// `Arc`, so readers never observe a half-built snapshot.
pub struct FleetBoard {
    latest: RwLock<Arc<FleetSnapshot>>,
}

impl FleetBoard {
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(Arc::new(FleetSnapshot::empty())),
        }
    }

    /// Combine `snapshots`, publish the result and return it.
    pub fn refresh<'a, I>(&self, snapshots: I) -> Arc<FleetSnapshot>
    where
        I: IntoIterator<Item = &'a ClientStatsSnapshot>,
        I::IntoIter: Clone,
    {
        let fresh = Arc::new(FleetAggregator::combine(snapshots));
        *self.latest.write() = Arc::clone(&fresh);
        fresh
    }

    pub fn latest(&self) -> Arc<FleetSnapshot> {
        Arc::clone(&self.latest.read())
    }

    /// Drop back to the empty snapshot, used when a new swarm run starts.
    pub fn clear(&self) {
        *self.latest.write() = Arc::new(FleetSnapshot::empty());
    }
}

impl Default for FleetBoard {
    fn default() -> Self {
        Self::new()
    }
}
