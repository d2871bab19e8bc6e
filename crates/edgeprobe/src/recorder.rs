//! Append-only sample store shared by every request of a run

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::sample::{Outcome, Sample};
use crate::scheduler::Scenario;

/// Running totals, one per [`Outcome`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub total: u64,
    pub success: u64,
    pub blocked: u64,
    pub other: u64,
    pub timeouts: u64,
    pub errors: u64,
}

impl Counters {
    pub(crate) fn count(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::Blocked => self.blocked += 1,
            Outcome::Other => self.other += 1,
            Outcome::Timeout => self.timeouts += 1,
            Outcome::Error => self.errors += 1,
        }
    }
}

/// Thread-safe recorder.
/// The executor calls `record()`, progress observers read `counters()`.
#[derive(Debug, Default)]
pub struct Recorder {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    samples: Vec<Sample>,
    counters: Counters,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample. Safe to call from many workers at once.
    pub fn record(&self, sample: Sample) -> Counters {
        let mut inner = self.inner.lock();
        inner.counters.count(sample.outcome());
        inner.samples.push(sample);
        inner.counters
    }

    pub fn counters(&self) -> Counters {
        self.inner.lock().counters
    }

    pub fn len(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze everything recorded so far into an immutable run
    pub fn finish(&self, metadata: RunMetadata) -> Run {
        let inner = std::mem::take(&mut *self.inner.lock());
        Run {
            metadata,
            samples: inner.samples,
        }
    }
}

/// Descriptive data about a run
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub target: String,
    pub scenario: Scenario,
    pub requested_duration: Duration,
    pub started_at: DateTime<Utc>,
    /// Wall time from scheduler start to the end of the run window
    pub elapsed: Duration,
}

/// Completed run: metadata plus samples in insertion order.
///
/// Under burst dispatch insertion order is completion order; use
/// [`Sample::offset`] for timeline position.
#[derive(Debug, Clone)]
pub struct Run {
    pub metadata: RunMetadata,
    pub samples: Vec<Sample>,
}

impl Run {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Status;
    use std::sync::Arc;

    fn sample(status: Status) -> Sample {
        Sample::new(Utc::now(), Duration::ZERO, status, Duration::from_millis(3))
    }

    fn metadata() -> RunMetadata {
        RunMetadata {
            target: "http://127.0.0.1".to_string(),
            scenario: Scenario::Baseline,
            requested_duration: Duration::from_secs(1),
            started_at: Utc::now(),
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_counters_follow_outcomes() {
        let recorder = Recorder::new();
        recorder.record(sample(Status::Code(200)));
        recorder.record(sample(Status::Code(429)));
        recorder.record(sample(Status::Code(500)));
        recorder.record(sample(Status::Timeout));
        let counters = recorder.record(sample(Status::Error("refused".into())));

        assert_eq!(counters.total, 5);
        assert_eq!(counters.success, 1);
        assert_eq!(counters.blocked, 1);
        assert_eq!(counters.other, 1);
        assert_eq!(counters.timeouts, 1);
        assert_eq!(counters.errors, 1);
        assert_eq!(recorder.counters(), counters);
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        let recorder = Arc::new(Recorder::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        recorder.record(sample(Status::Code(200)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(recorder.len(), 2000);
        assert_eq!(recorder.counters().success, 2000);
    }

    #[test]
    fn test_finish_drains_samples() {
        let recorder = Recorder::new();
        recorder.record(sample(Status::Code(200)));
        recorder.record(sample(Status::Code(403)));

        let run = recorder.finish(metadata());
        assert_eq!(run.len(), 2);
        assert!(recorder.is_empty());
        assert_eq!(recorder.counters(), Counters::default());
    }
}
