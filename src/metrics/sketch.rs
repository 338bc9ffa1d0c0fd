use std::f64::consts::PI;

// ─── Configuration ───────────────────────────────────────────────

/// Default compression. Bounds the merged digest to roughly this many
/// centroids (~1.6 KB of centroids plus the ingest buffer).
pub const DEFAULT_COMPRESSION: f64 = 100.0;

/// Smallest compression we accept; anything lower is clamped up.
const MIN_COMPRESSION: f64 = 10.0;

/// Raw samples buffered before they are folded into the centroids.
/// Sized as a multiple of the compression so flushes stay infrequent.
const BUFFER_FACTOR: f64 = 5.0;

// ─── Public types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct Centroid {
    mean: f64,
    weight: f64,
}

/// Fixed-footprint streaming quantile sketch (merging t-digest).
///
/// Samples land in a flat buffer; when it fills, the buffer is sorted and
/// merged with the existing centroids under the arcsine scale function,
/// which keeps centroids small near q=0 and q=1. That is where p95/p99
/// live, so the tails get the finest resolution.
///
/// Not internally synchronized. `MetricTracker` serializes access.
#[derive(Debug, Clone)]
pub struct QuantileSketch {
    compression: f64,
    centroids: Vec<Centroid>,
    merged_weight: f64,
    buffer: Vec<f64>,
    buffer_cap: usize,
    min: f64,
    max: f64,
}

impl Default for QuantileSketch {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION)
    }
}

// ─── QuantileSketch impl ─────────────────────────────────────────

impl QuantileSketch {
    /// Non-finite or too-small compression values are clamped to a sane
    /// minimum rather than rejected.
    pub fn new(compression: f64) -> Self {
        let compression = if compression.is_finite() {
            compression.max(MIN_COMPRESSION)
        } else {
            DEFAULT_COMPRESSION
        };
        let buffer_cap = (compression * BUFFER_FACTOR).ceil() as usize;

        Self {
            compression,
            centroids: Vec::with_capacity(compression as usize * 2),
            merged_weight: 0.0,
            buffer: Vec::with_capacity(buffer_cap),
            buffer_cap,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn compression(&self) -> f64 {
        self.compression
    }

    /// Total number of samples seen, merged or still buffered.
    pub fn count(&self) -> u64 {
        (self.merged_weight.round() as u64) + self.buffer.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.merged_weight == 0.0 && self.buffer.is_empty()
    }

    /// Number of merged centroids. Buffered samples are not counted.
    pub fn centroid_count(&self) -> usize {
        self.centroids.len()
    }

    /// Adds one sample. NaN/infinite values are dropped, negatives clamp to 0.
    pub fn ingest(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let value = value.max(0.0);

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.buffer.push(value);

        if self.buffer.len() >= self.buffer_cap {
            self.flush();
        }
    }

    /// Approximate value at quantile `q` (clamped into `[0, 1]`).
    /// Returns `0.0` for an empty sketch.
    pub fn quantile(&mut self, q: f64) -> f64 {
        self.flush();
        self.quantile_merged(q)
    }

    /// Same as `quantile` for several points, folding the buffer only once.
    pub fn quantiles<const N: usize>(&mut self, qs: [f64; N]) -> [f64; N] {
        self.flush();
        qs.map(|q| self.quantile_merged(q))
    }

    pub fn clear(&mut self) {
        self.centroids.clear();
        self.buffer.clear();
        self.merged_weight = 0.0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    // ── Merge ───────────────────────────────────────────────────

    /// Folds buffered samples into the centroid list.
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        self.buffer.sort_unstable_by(f64::total_cmp);

        // Merge-sort the (already sorted) centroids with the sorted buffer
        let mut incoming: Vec<Centroid> =
            Vec::with_capacity(self.centroids.len() + self.buffer.len());
        {
            let mut existing = self.centroids.iter().copied().peekable();
            let mut fresh = self.buffer.iter().copied().peekable();
            loop {
                let take_existing = match (existing.peek(), fresh.peek()) {
                    (Some(c), Some(v)) => c.mean <= *v,
                    (Some(_), None) => true,
                    (None, Some(_)) => false,
                    (None, None) => break,
                };
                if take_existing {
                    incoming.extend(existing.next());
                } else if let Some(v) = fresh.next() {
                    incoming.push(Centroid {
                        mean: v,
                        weight: 1.0,
                    });
                }
            }
        }

        let total = self.merged_weight + self.buffer.len() as f64;
        self.buffer.clear();
        self.merged_weight = total;
        self.centroids = self.compress(incoming, total);
    }

    /// One left-to-right pass: merge neighbours while the combined
    /// centroid still fits inside one unit of the scale function.
    fn compress(&self, sorted: Vec<Centroid>, total: f64) -> Vec<Centroid> {
        let mut out: Vec<Centroid> = Vec::with_capacity(self.compression as usize * 2);
        let mut items = sorted.into_iter();
        let Some(mut current) = items.next() else {
            return out;
        };

        let mut weight_before = 0.0;
        let mut q_limit = self.q_limit(0.0);

        for next in items {
            let proposed = weight_before + current.weight + next.weight;
            if proposed / total <= q_limit {
                let weight = current.weight + next.weight;
                current.mean += (next.mean - current.mean) * (next.weight / weight);
                current.weight = weight;
            } else {
                weight_before += current.weight;
                q_limit = self.q_limit(weight_before / total);
                out.push(current);
                current = next;
            }
        }
        out.push(current);
        out
    }

    /// k1 scale: k(q) = δ/(2π)·asin(2q−1). Returns q where k has advanced by 1.
    fn q_limit(&self, q0: f64) -> f64 {
        let k0 = self.compression / (2.0 * PI) * (2.0 * q0 - 1.0).clamp(-1.0, 1.0).asin();
        let k1 = k0 + 1.0;
        let angle = (k1 * 2.0 * PI / self.compression).min(PI / 2.0);
        (angle.sin() + 1.0) / 2.0
    }

    // ── Query ───────────────────────────────────────────────────

    /// Piecewise-linear interpolation through (0, min), each centroid at
    /// its mid-rank, and (total, max). Monotone in `q` because centroid
    /// means are sorted and bracketed by min/max.
    fn quantile_merged(&self, q: f64) -> f64 {
        if self.centroids.is_empty() {
            return 0.0;
        }
        let q = if q.is_nan() { 0.5 } else { q.clamp(0.0, 1.0) };
        if q == 0.0 {
            return self.min;
        }
        if q == 1.0 {
            return self.max;
        }
        if self.centroids.len() == 1 {
            let only = self.centroids[0];
            if only.weight <= 1.0 {
                return only.mean;
            }
        }

        let total = self.merged_weight;
        let target = q * total;

        let mut prev_rank = 0.0;
        let mut prev_value = self.min;
        let mut cumulative = 0.0;

        for centroid in &self.centroids {
            let rank = cumulative + centroid.weight / 2.0;
            if target <= rank {
                return interpolate(prev_rank, prev_value, rank, centroid.mean, target);
            }
            prev_rank = rank;
            prev_value = centroid.mean;
            cumulative += centroid.weight;
        }

        interpolate(prev_rank, prev_value, total, self.max, target)
    }
}

fn interpolate(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    if x1 - x0 <= f64::EPSILON {
        return y1;
    }
    let t = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
    y0 + t * (y1 - y0)
}
