pub mod percentiles;
pub mod sketch;
pub mod stream;
pub mod tracker;

pub use percentiles::PercentileSet;
pub use sketch::QuantileSketch;
pub use tracker::{MetricTracker, TrackerConfig};

/// Nanoseconds to fractional milliseconds, for human-facing output.
pub fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}
