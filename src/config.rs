use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::metrics::TrackerConfig;

// ─── Limits ──────────────────────────────────────────────────────

pub const MAX_CLIENTS: u32 = 5_000;
pub const MAX_DURATION_SECS: u64 = 3_600;

/// Rejected swarm parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("clients must be between 1 and 5000, got {0}")]
    Clients(u32),

    #[error("duration_secs must be between 1 and 3600, got {0}")]
    Duration(u64),

    #[error("lost_start_pct must be between 0 and 100, got {0}")]
    LostStartPct(u8),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

// ─── Process config (CLI / env) ──────────────────────────────────

/// Command-line configuration for the swarm observatory.
#[derive(Debug, Clone, Parser)]
#[command(name = "swarm-latency", about = "Streaming-client swarm latency observatory")]
pub struct Cli {
    /// Address the HTTP API binds to
    #[arg(long, env = "SWARM_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Start a swarm immediately instead of waiting for POST /api/swarm/start
    #[arg(long, env = "SWARM_AUTOSTART")]
    pub autostart: bool,

    #[command(flatten)]
    pub swarm: SwarmRequest,
}

/// Parameters of one swarm run. Also the JSON body of `POST /api/swarm/start`.
#[derive(Debug, Clone, PartialEq, Deserialize, clap::Args)]
pub struct SwarmRequest {
    /// Number of concurrently simulated streaming clients
    #[arg(long, env = "SWARM_CLIENTS", default_value_t = default_clients())]
    #[serde(default = "default_clients")]
    pub clients: u32,

    /// How long the swarm runs (seconds)
    #[arg(long, env = "SWARM_DURATION_SECS", default_value_t = default_duration())]
    #[serde(default = "default_duration")]
    pub duration_secs: u64,

    /// Median simulated segment fetch time
    #[arg(long, env = "SWARM_SEGMENT_LATENCY_MS", default_value_t = default_segment_latency())]
    #[serde(default = "default_segment_latency")]
    pub segment_latency_ms: u64,

    /// Median simulated manifest refresh time
    #[arg(long, env = "SWARM_MANIFEST_LATENCY_MS", default_value_t = default_manifest_latency())]
    #[serde(default = "default_manifest_latency")]
    pub manifest_latency_ms: u64,

    /// Manifest refresh period per client
    #[arg(long, env = "SWARM_MANIFEST_INTERVAL_MS", default_value_t = default_manifest_interval())]
    #[serde(default = "default_manifest_interval")]
    pub manifest_interval_ms: u64,

    /// How often each client publishes its snapshot
    #[arg(long, env = "SWARM_PUBLISH_INTERVAL_MS", default_value_t = default_publish_interval())]
    #[serde(default = "default_publish_interval")]
    pub publish_interval_ms: u64,

    /// How often the fleet snapshot is rebuilt
    #[arg(long, env = "SWARM_AGGREGATE_INTERVAL_MS", default_value_t = default_aggregate_interval())]
    #[serde(default = "default_aggregate_interval")]
    pub aggregate_interval_ms: u64,

    /// Percentage of requests whose start event is "lost" upstream
    #[arg(long, env = "SWARM_LOST_START_PCT", default_value_t = 0)]
    #[serde(default)]
    pub lost_start_pct: u8,

    #[arg(skip)]
    #[serde(default)]
    pub tracker: TrackerConfig,
}

fn default_clients() -> u32 {
    50
}
fn default_duration() -> u64 {
    60
}
fn default_segment_latency() -> u64 {
    80
}
fn default_manifest_latency() -> u64 {
    30
}
fn default_manifest_interval() -> u64 {
    2_000
}
fn default_publish_interval() -> u64 {
    500
}
fn default_aggregate_interval() -> u64 {
    1_000
}

impl Default for SwarmRequest {
    fn default() -> Self {
        Self {
            clients: default_clients(),
            duration_secs: default_duration(),
            segment_latency_ms: default_segment_latency(),
            manifest_latency_ms: default_manifest_latency(),
            manifest_interval_ms: default_manifest_interval(),
            publish_interval_ms: default_publish_interval(),
            aggregate_interval_ms: default_aggregate_interval(),
            lost_start_pct: 0,
            tracker: TrackerConfig::default(),
        }
    }
}

impl SwarmRequest {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clients == 0 || self.clients > MAX_CLIENTS {
            return Err(ConfigError::Clients(self.clients));
        }
        if self.duration_secs == 0 || self.duration_secs > MAX_DURATION_SECS {
            return Err(ConfigError::Duration(self.duration_secs));
        }
        if self.lost_start_pct > 100 {
            return Err(ConfigError::LostStartPct(self.lost_start_pct));
        }
        for (name, value) in [
            ("segment_latency_ms", self.segment_latency_ms),
            ("manifest_latency_ms", self.manifest_latency_ms),
            ("manifest_interval_ms", self.manifest_interval_ms),
            ("publish_interval_ms", self.publish_interval_ms),
            ("aggregate_interval_ms", self.aggregate_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn aggregate_interval(&self) -> Duration {
        Duration::from_millis(self.aggregate_interval_ms)
    }

    pub fn manifest_interval(&self) -> Duration {
        Duration::from_millis(self.manifest_interval_ms)
    }
}
