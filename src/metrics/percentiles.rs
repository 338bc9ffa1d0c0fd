use serde::{Deserialize, Serialize};

use super::sketch::QuantileSketch;

/// Quantile points read from the sketch on every snapshot.
pub const SNAPSHOT_QUANTILES: [f64; 5] = [0.25, 0.50, 0.75, 0.95, 0.99];

/// A complete percentile breakdown for one metric.
/// All durations are nanoseconds. Serialized straight into the fleet JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileSet {
    pub count: u64,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
    pub p25: u64,
    pub p50: u64,
    pub p75: u64,
    pub p95: u64,
    pub p99: u64,
}

impl Default for PercentileSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PercentileSet {
    /// Build a set from exact running fields plus the sketch's estimates.
    /// Returns zeroed values if nothing was recorded.
    pub fn from_parts(
        count: u64,
        sum_ns: u128,
        min: u64,
        max: u64,
        sketch: &mut QuantileSketch,
    ) -> Self {
        if count == 0 {
            return Self::empty();
        }

        let [p25, p50, p75, p95, p99] = sketch.quantiles(SNAPSHOT_QUANTILES);

        // Estimates are clamped to the exact bounds and forced monotone so
        // downstream readers never see p95 > p99 from rounding.
        let clamp = |v: f64| (v.round() as u64).clamp(min, max);
        let p25 = clamp(p25);
        let p50 = clamp(p50).max(p25);
        let p75 = clamp(p75).max(p50);
        let p95 = clamp(p95).max(p75);
        let p99 = clamp(p99).max(p95);

        Self {
            count,
            mean: sum_ns as f64 / count as f64,
            min,
            max,
            p25,
            p50,
            p75,
            p95,
            p99,
        }
    }

    /// All-zero placeholder used before any samples are recorded.
    pub fn empty() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            min: 0,
            max: 0,
            p25: 0,
            p50: 0,
            p75: 0,
            p95: 0,
            p99: 0,
        }
    }

    /// Convenience: is this set backed by at least one observation?
    pub fn has_data(&self) -> bool {
        self.count > 0
    }

    /// Fleet-wide view of many per-client sets.
    ///
    /// - `count` sums, `mean` is count-weighted.
    /// - `min` is the smallest among sets that have data.
    /// - `max` and every percentile take the worst (largest) client value.
    ///
    /// Sets with `count == 0` are skipped entirely, so an idle client can
    /// never drag `min` down to its zero placeholder.
    pub fn combine<'a, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'a PercentileSet>,
    {
        let mut out = Self::empty();
        let mut weighted_sum = 0.0;
        let mut seen_any = false;

        for set in sets.into_iter().filter(|s| s.has_data()) {
            out.count += set.count;
            weighted_sum += set.mean * set.count as f64;

            out.min = if seen_any { out.min.min(set.min) } else { set.min };
            seen_any = true;

            out.max = out.max.max(set.max);
            out.p25 = out.p25.max(set.p25);
            out.p50 = out.p50.max(set.p50);
            out.p75 = out.p75.max(set.p75);
            out.p95 = out.p95.max(set.p95);
            out.p99 = out.p99.max(set.p99);
        }

        if out.count > 0 {
            out.mean = weighted_sum / out.count as f64;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    fn set(count: u64, mean_ms: f64, min_ms: u64, max_ms: u64, p99_ms: u64) -> PercentileSet {
        PercentileSet {
            count,
            mean: mean_ms * MS as f64,
            min: min_ms * MS,
            max: max_ms * MS,
            p25: min_ms * MS,
            p50: min_ms * MS,
            p75: p99_ms * MS,
            p95: p99_ms * MS,
            p99: p99_ms * MS,
        }
    }

    #[test]
    fn combine_uses_sum_weighted_mean_and_worst_tail() {
        let a = set(10, 20.0, 5, 60, 50);
        let b = set(20, 35.0, 8, 90, 80);
        let fleet = PercentileSet::combine([&a, &b]);

        assert_eq!(fleet.count, 30);
        assert_eq!(fleet.p99, 80 * MS);
        assert_eq!(fleet.min, 5 * MS);
        assert_eq!(fleet.max, 90 * MS);
        let expected = (20.0 * 10.0 + 35.0 * 20.0) / 30.0 * MS as f64;
        assert!((fleet.mean - expected).abs() < 1e-6);
    }

    #[test]
    fn combine_of_nothing_is_empty() {
        let fleet = PercentileSet::combine(std::iter::empty());
        assert_eq!(fleet, PercentileSet::empty());
        assert!(!fleet.has_data());
    }

    #[test]
    fn idle_sets_do_not_pollute_min() {
        let idle = PercentileSet::empty();
        let busy = set(5, 12.0, 7, 20, 19);
        let fleet = PercentileSet::combine([&idle, &busy, &idle]);
        assert_eq!(fleet.min, 7 * MS);
        assert_eq!(fleet.count, 5);
    }

    #[test]
    fn from_parts_on_empty_is_zeroed() {
        let mut sketch = QuantileSketch::default();
        assert_eq!(
            PercentileSet::from_parts(0, 0, 0, 0, &mut sketch),
            PercentileSet::empty()
        );
    }
}
