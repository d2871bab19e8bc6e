//! Statistics over a completed run
//!
//! Everything here is a pure function of a [`Run`]. Percentiles use the
//! nearest-rank rule on the sorted latency set: index `floor(n * p / 100)`,
//! clamped to `n - 1`, no interpolation.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::recorder::{Counters, Run};
use crate::sample::{Sample, StatusBucket};

/// Nearest-rank percentile of an ascending slice. Empty input yields zero.
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let index = (sorted.len() as f64 * (p / 100.0)) as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Latency distribution of the samples that received a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl LatencySummary {
    /// All-zero when `latencies` is empty
    pub fn from_latencies(mut latencies: Vec<Duration>) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }
        latencies.sort_unstable();

        let total: Duration = latencies.iter().sum();
        Self {
            count: latencies.len(),
            min: latencies[0],
            max: latencies[latencies.len() - 1],
            mean: total / latencies.len() as u32,
            p50: percentile(&latencies, 50.0),
            p95: percentile(&latencies, 95.0),
            p99: percentile(&latencies, 99.0),
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

/// When the defense first rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockOnset {
    /// Earliest dispatch offset among blocked samples
    pub offset: Duration,
    pub issued_at: DateTime<Utc>,
    /// Samples dispatched strictly before `offset`
    pub requests_before: u64,
}

impl BlockOnset {
    pub fn detect(samples: &[Sample]) -> Option<Self> {
        let first = samples
            .iter()
            .filter(|s| s.blocked)
            .min_by_key(|s| s.offset)?;

        let requests_before = samples.iter().filter(|s| s.offset < first.offset).count() as u64;
        Some(Self {
            offset: first.offset,
            issued_at: first.issued_at,
            requests_before,
        })
    }
}

/// Aggregate view of a run, computed once
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub counters: Counters,
    pub status_counts: BTreeMap<StatusBucket, u64>,
    pub latency: LatencySummary,
    pub elapsed: Duration,
    pub requests_per_sec: f64,
    /// Blocked share of all requests, in percent
    pub block_rate: f64,
    pub block_onset: Option<BlockOnset>,
}

impl RunStatistics {
    pub fn from_run(run: &Run) -> Self {
        let mut counters = Counters::default();
        let mut status_counts = BTreeMap::new();
        let mut latencies = Vec::with_capacity(run.len());

        for sample in &run.samples {
            counters.count(sample.outcome());
            *status_counts.entry(sample.status.bucket()).or_insert(0) += 1;
            if let Some(latency) = sample.response_latency() {
                latencies.push(latency);
            }
        }

        let elapsed = run.metadata.elapsed;
        let requests_per_sec = if elapsed.is_zero() {
            0.0
        } else {
            counters.total as f64 / elapsed.as_secs_f64()
        };

        Self {
            counters,
            status_counts,
            latency: LatencySummary::from_latencies(latencies),
            elapsed,
            requests_per_sec,
            block_rate: share(counters.blocked, counters.total),
            block_onset: BlockOnset::detect(&run.samples),
        }
    }

    /// Share of `count` among all requests, in percent
    pub fn share_of(&self, count: u64) -> f64 {
        share(count, self.counters.total)
    }
}

fn share(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RunMetadata;
    use crate::sample::Status;
    use crate::scheduler::Scenario;
    use proptest::prelude::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn sample_at(offset_secs: u64, status: Status, latency_ms: u64) -> Sample {
        Sample::new(Utc::now(), Duration::from_secs(offset_secs), status, ms(latency_ms))
    }

    fn run_of(samples: Vec<Sample>) -> Run {
        Run {
            metadata: RunMetadata {
                target: "http://target.test".to_string(),
                scenario: Scenario::RateLimit,
                requested_duration: Duration::from_secs(10),
                started_at: Utc::now(),
                elapsed: Duration::from_secs(10),
            },
            samples,
        }
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let data: Vec<Duration> = (1..=10).map(ms).collect();
        // floor(10 * 0.5) = 5 -> 6th value
        assert_eq!(percentile(&data, 50.0), ms(6));
        // floor(10 * 0.95) = 9 -> last
        assert_eq!(percentile(&data, 95.0), ms(10));
        assert_eq!(percentile(&data, 99.0), ms(10));
        assert_eq!(percentile(&data, 100.0), ms(10));
        assert_eq!(percentile(&data, 0.0), ms(1));
    }

    #[test]
    fn test_percentile_single_value() {
        assert_eq!(percentile(&[ms(7)], 50.0), ms(7));
        assert_eq!(percentile(&[ms(7)], 99.0), ms(7));
    }

    #[test]
    fn test_empty_latencies_are_zero() {
        assert_eq!(percentile(&[], 95.0), Duration::ZERO);

        let summary = LatencySummary::from_latencies(Vec::new());
        assert!(!summary.has_data());
        assert_eq!(summary.p50, Duration::ZERO);
        assert_eq!(summary.p99, Duration::ZERO);
        assert_eq!(summary.min, Duration::ZERO);
        assert_eq!(summary.max, Duration::ZERO);
        assert_eq!(summary.mean, Duration::ZERO);
    }

    #[test]
    fn test_summary_ordering() {
        let latencies = vec![ms(120), ms(3), ms(45), ms(45), ms(900), ms(18), ms(61), ms(2)];
        let s = LatencySummary::from_latencies(latencies);

        assert!(s.min <= s.p50);
        assert!(s.p50 <= s.p95);
        assert!(s.p95 <= s.p99);
        assert!(s.p99 <= s.max);
        assert_eq!(s.min, ms(2));
        assert_eq!(s.max, ms(900));
        assert_eq!(s.mean, Duration::from_micros(149_250));
    }

    proptest! {
        #[test]
        fn prop_summary_is_ordered(micros in prop::collection::vec(0u64..10_000_000, 1..500)) {
            let latencies: Vec<Duration> = micros.iter().copied().map(Duration::from_micros).collect();
            let s = LatencySummary::from_latencies(latencies);

            prop_assert!(s.min <= s.p50);
            prop_assert!(s.p50 <= s.p95);
            prop_assert!(s.p95 <= s.p99);
            prop_assert!(s.p99 <= s.max);
            prop_assert!(s.min <= s.mean && s.mean <= s.max);
            prop_assert_eq!(s.count, micros.len());
        }
    }

    #[test]
    fn test_counts_partition_total() {
        let run = run_of(vec![
            sample_at(0, Status::Code(200), 10),
            sample_at(1, Status::Code(200), 12),
            sample_at(2, Status::Code(404), 9),
            sample_at(3, Status::Code(429), 4),
            sample_at(4, Status::Timeout, 0),
            sample_at(5, Status::Error("connect: refused".into()), 0),
            sample_at(6, Status::Error("connect: reset".into()), 0),
        ]);
        let stats = RunStatistics::from_run(&run);
        let c = stats.counters;

        assert_eq!(c.total, 7);
        assert_eq!(c.total, c.success + c.blocked + c.other + c.timeouts + c.errors);
        assert_eq!(stats.status_counts[&StatusBucket::Code(200)], 2);
        assert_eq!(stats.status_counts[&StatusBucket::Error], 2);
        assert_eq!(stats.status_counts[&StatusBucket::Timeout], 1);
        assert_eq!(stats.status_counts.values().sum::<u64>(), c.total);
        // Only responses contribute latencies
        assert_eq!(stats.latency.count, 4);
        assert!((stats.requests_per_sec - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_block_onset_uses_earliest_dispatch() {
        // Completion order differs from dispatch order, as under burst
        let run = run_of(vec![
            sample_at(5, Status::Code(429), 3),
            sample_at(0, Status::Code(200), 3),
            sample_at(3, Status::Code(403), 3),
            sample_at(1, Status::Code(200), 3),
            sample_at(3, Status::Code(200), 3),
        ]);
        let stats = RunStatistics::from_run(&run);
        let onset = stats.block_onset.unwrap();

        assert_eq!(onset.offset, Duration::from_secs(3));
        assert_eq!(onset.requests_before, 2);
        assert!((stats.block_rate - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_blocking() {
        let run = run_of(vec![sample_at(0, Status::Code(200), 3)]);
        let stats = RunStatistics::from_run(&run);
        assert!(stats.block_onset.is_none());
        assert_eq!(stats.block_rate, 0.0);
    }

    #[test]
    fn test_empty_run() {
        let stats = RunStatistics::from_run(&run_of(Vec::new()));
        assert_eq!(stats.counters.total, 0);
        assert!(!stats.latency.has_data());
        assert_eq!(stats.share_of(0), 0.0);
    }
}
