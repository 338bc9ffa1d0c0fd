use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::correlator::{CorrelatorState, EventCorrelator, ResourceKind, ResourceSnapshot};
use crate::metrics::TrackerConfig;

/// Everything one simulated streaming client measures about itself.
///
/// Owned exclusively by that client's worker; nothing here is global.
pub struct ClientStats {
    id: String,
    correlator: EventCorrelator,
}

/// Point-in-time copy of one client's metrics. Shares nothing with the
/// trackers that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStatsSnapshot {
    pub client_id: String,
    pub taken_at: DateTime<Utc>,
    pub segment: ResourceSnapshot,
    pub manifest: ResourceSnapshot,
}

impl ClientStats {
    pub fn new(id: impl Into<String>, config: &TrackerConfig) -> Self {
        Self {
            id: id.into(),
            correlator: EventCorrelator::new(config),
        }
    }

    /// Client with a random v4 UUID as its id.
    pub fn with_random_id(config: &TrackerConfig) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), config)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn on_start(&self, kind: ResourceKind, at: Instant) {
        self.correlator.on_start(kind, at);
    }

    pub fn on_complete(&self, kind: ResourceKind, at: Instant) -> Option<std::time::Duration> {
        self.correlator.on_complete(kind, at)
    }

    pub fn state(&self, kind: ResourceKind) -> CorrelatorState {
        self.correlator.state(kind)
    }

    pub fn correlator(&self) -> &EventCorrelator {
        &self.correlator
    }

    /// Each kind is read under its own tracker lock, so the two halves may
    /// be a few samples apart; each half is internally consistent.
    pub fn snapshot(&self) -> ClientStatsSnapshot {
        ClientStatsSnapshot {
            client_id: self.id.clone(),
            taken_at: Utc::now(),
            segment: self.correlator.snapshot(ResourceKind::Segment),
            manifest: self.correlator.snapshot(ResourceKind::Manifest),
        }
    }
}

impl ClientStatsSnapshot {
    pub fn resource(&self, kind: ResourceKind) -> &ResourceSnapshot {
        match kind {
            ResourceKind::Segment => &self.segment,
            ResourceKind::Manifest => &self.manifest,
        }
    }
}
