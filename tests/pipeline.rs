//! End-to-end: events → correlator → tracker → client snapshot → fleet.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use swarm_latency::client::ClientStats;
use swarm_latency::correlator::{CorrelatorState, ResourceKind};
use swarm_latency::fleet::FleetAggregator;
use swarm_latency::metrics::{MetricTracker, TrackerConfig};

const MS: u64 = 1_000_000;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Drive `latencies` through a client as back-to-back start/complete pairs.
fn client_with(id: &str, kind: ResourceKind, latencies: &[u64]) -> ClientStats {
    let client = ClientStats::new(id, &TrackerConfig::default());
    let mut t = Instant::now();
    for &l in latencies {
        client.on_start(kind, t);
        t += ms(l);
        client.on_complete(kind, t);
    }
    client
}

#[test]
fn fleet_combines_real_client_snapshots() {
    let fast: Vec<u64> = (1..=10).collect();
    let slow: Vec<u64> = (1..=20).map(|v| v * 4).collect();

    let a = client_with("a", ResourceKind::Segment, &fast).snapshot();
    let b = client_with("b", ResourceKind::Segment, &slow).snapshot();
    let idle = ClientStats::new("idle", &TrackerConfig::default()).snapshot();

    let fleet = FleetAggregator::combine([&a, &b, &idle]);
    let seg = fleet.segment.latency;

    assert_eq!(fleet.clients, 3);
    assert_eq!(seg.count, 30);
    assert_eq!(seg.min, MS);
    assert_eq!(seg.max, 80 * MS);
    assert_eq!(seg.p99, a.segment.latency.p99.max(b.segment.latency.p99));

    let expected_mean =
        (a.segment.latency.mean * 10.0 + b.segment.latency.mean * 20.0) / 30.0;
    assert!((seg.mean - expected_mean).abs() < 1e-3);
    assert!(!fleet.manifest.latency.has_data());
}

#[test]
fn unmatched_completions_are_counted_not_ingested() {
    let client = ClientStats::new("c", &TrackerConfig::default());
    let t0 = Instant::now();

    client.on_complete(ResourceKind::Manifest, t0);
    client.on_complete(ResourceKind::Manifest, t0 + ms(1));
    assert_eq!(client.state(ResourceKind::Manifest), CorrelatorState::Idle);

    let snap = client.snapshot();
    assert_eq!(snap.manifest.unmatched, 2);
    assert_eq!(snap.manifest.latency.count, 0);

    let fleet = FleetAggregator::combine([&snap]);
    assert_eq!(fleet.manifest.unmatched, 2);
    assert_eq!(fleet.manifest.latency.min, 0);
}

#[test]
fn snapshots_never_see_partial_updates() {
    let tracker = Arc::new(MetricTracker::default());
    const WRITERS: u64 = 4;
    const PER_WRITER: u64 = 5_000;

    thread::scope(|s| {
        for w in 0..WRITERS {
            let tracker = tracker.clone();
            s.spawn(move || {
                for i in 0..PER_WRITER {
                    // Every sample is 1..=10ms, so min/max/mean are bracketed
                    tracker.ingest(ms(1 + (i + w) % 10));
                }
            });
        }

        let tracker = tracker.clone();
        s.spawn(move || {
            let mut last = 0;
            for _ in 0..2_000 {
                let snap = tracker.snapshot();
                assert!(snap.count >= last, "count went backwards");
                last = snap.count;
                if snap.count == 0 {
                    assert_eq!(snap.mean, 0.0);
                    continue;
                }
                assert!(snap.min >= MS && snap.max <= 10 * MS);
                assert!(snap.min as f64 <= snap.mean && snap.mean <= snap.max as f64);
                assert!(snap.p25 <= snap.p50 && snap.p50 <= snap.p75);
                assert!(snap.p75 <= snap.p95 && snap.p95 <= snap.p99);
            }
        });
    });

    assert_eq!(tracker.count(), WRITERS * PER_WRITER);
}

proptest! {
    #[test]
    fn exact_fields_match_input(samples in prop::collection::vec(0u64..5_000_000_000, 1..400)) {
        let tracker = MetricTracker::default();
        for &ns in &samples {
            tracker.ingest(Duration::from_nanos(ns));
        }
        let snap = tracker.snapshot();

        let sum: u128 = samples.iter().map(|&v| u128::from(v)).sum();
        let mean = sum as f64 / samples.len() as f64;

        prop_assert_eq!(snap.count, samples.len() as u64);
        prop_assert_eq!(snap.min, *samples.iter().min().unwrap());
        prop_assert_eq!(snap.max, *samples.iter().max().unwrap());
        prop_assert!((snap.mean - mean).abs() <= mean.abs() * 1e-12 + 1e-6);
    }

    #[test]
    fn percentiles_are_monotone(samples in prop::collection::vec(0u64..1_000_000_000, 1..2_000)) {
        let tracker = MetricTracker::default();
        for &ns in &samples {
            tracker.ingest(Duration::from_nanos(ns));
        }
        let s = tracker.snapshot();
        prop_assert!(s.min <= s.p25);
        prop_assert!(s.p25 <= s.p50);
        prop_assert!(s.p50 <= s.p75);
        prop_assert!(s.p75 <= s.p95);
        prop_assert!(s.p95 <= s.p99);
        prop_assert!(s.p99 <= s.max);
    }

    #[test]
    fn fifo_pairs_in_start_order(gaps in prop::collection::vec(1u64..50, 1..20)) {
        // All starts first, then completions in the same order, each
        // completion 100ms after its own start.
        let client = ClientStats::new("p", &TrackerConfig::default());
        let base = Instant::now();
        let mut starts = Vec::with_capacity(gaps.len());
        let mut t = base;
        for g in &gaps {
            t += ms(*g);
            starts.push(t);
            client.on_start(ResourceKind::Segment, t);
        }
        for s in &starts {
            let got = client.on_complete(ResourceKind::Segment, *s + ms(100));
            prop_assert_eq!(got, Some(ms(100)));
        }
        prop_assert_eq!(client.state(ResourceKind::Segment), CorrelatorState::Idle);
    }
}
