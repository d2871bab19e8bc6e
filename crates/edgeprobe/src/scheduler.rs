//! Pacing scheduler
//!
//! Drives the [`RequestExecutor`] through one of four load shapes for a
//! bounded wall-clock window:
//!
//! | Scenario     | Shape                               | Nominal rate  |
//! |--------------|-------------------------------------|---------------|
//! | `baseline`   | one request, then sleep 3s          | 20 req/min    |
//! | `sustained`  | one request, then sleep 1s          | 60 req/min    |
//! | `rate-limit` | one request, then sleep 0.4s        | 150 req/min   |
//! | `burst`      | 200 requests over 20 workers, idle  | ~200 in ~10s  |
//!
//! Paced shapes sleep a constant interval after each request. The sleep is
//! not shortened by the request's latency, so the achieved rate is at most
//! the nominal one and drops as the target slows down.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::error::ProbeError;
use crate::executor::{RequestExecutor, Transport, DEFAULT_REQUEST_TIMEOUT};
use crate::progress::{ProgressObserver, ProgressUpdate, SilentProgress};
use crate::recorder::{Recorder, Run, RunMetadata};

// ============================================================================
// SCENARIOS
// ============================================================================

/// Load shape, selected once at run start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    Baseline,
    Sustained,
    RateLimit,
    Burst,
}

/// How a scenario spaces its requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Execute, then sleep this long
    FixedInterval(Duration),
    /// Fixed request count through a bounded worker pool
    Burst,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Baseline,
        Scenario::Sustained,
        Scenario::RateLimit,
        Scenario::Burst,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Baseline => "baseline",
            Scenario::Sustained => "sustained",
            Scenario::RateLimit => "rate-limit",
            Scenario::Burst => "burst",
        }
    }

    /// Nominal requests per minute for paced shapes
    pub fn requests_per_minute(&self) -> Option<u32> {
        match self {
            Scenario::Baseline => Some(20),
            Scenario::Sustained => Some(60),
            Scenario::RateLimit => Some(150),
            Scenario::Burst => None,
        }
    }

    pub fn pacing(&self) -> Pacing {
        match self.requests_per_minute() {
            Some(rpm) => Pacing::FixedInterval(Duration::from_millis(60_000 / rpm as u64)),
            None => Pacing::Burst,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::Baseline => "Normal user behavior (20 req/min)",
            Scenario::Sustained => "Long-running moderate load (60 req/min)",
            Scenario::RateLimit => "Aggressive load (150 req/min)",
            Scenario::Burst => "Sudden traffic spike (200 requests in ~10s)",
        }
    }

    /// What a typical 100 req/min edge policy should do under this shape
    pub fn expectation(&self) -> &'static str {
        match self {
            Scenario::Baseline => "Should NOT trigger a 100 req/min rate limit",
            Scenario::Sustained => "Just below a 100 req/min threshold, stability check",
            Scenario::RateLimit => "Should trigger blocking after roughly 40s of traffic",
            Scenario::Burst => "Should trigger blocking almost immediately",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| ProbeError::InvalidScenario(s.to_string()))
    }
}

/// Parameters of the burst shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstSettings {
    /// Requests dispatched in total
    pub requests: u64,
    /// Concurrent workers
    pub workers: usize,
    /// Wall time the burst is expected to take, in seconds
    pub budget_secs: u64,
}

impl Default for BurstSettings {
    fn default() -> Self {
        Self {
            requests: 200,
            workers: 20,
            budget_secs: 10,
        }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Runs scenarios against one target through a shared transport
pub struct Scheduler<T> {
    transport: Arc<T>,
    target: String,
    request_timeout: Duration,
    burst: BurstSettings,
    observer: Arc<dyn ProgressObserver>,
}

impl<T: Transport> Scheduler<T> {
    pub fn new(transport: T, target: impl Into<String>) -> Self {
        Self {
            transport: Arc::new(transport),
            target: target.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            burst: BurstSettings::default(),
            observer: Arc::new(SilentProgress),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_burst(mut self, burst: BurstSettings) -> Self {
        self.burst = burst;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Run one scenario for `duration` and return the frozen run
    pub async fn run(&self, scenario: Scenario, duration: Duration) -> Run {
        let started_at = Utc::now();
        let clock = Instant::now();
        let recorder = Arc::new(Recorder::new());
        let executor = RequestExecutor::new(self.transport.clone(), self.target.clone(), recorder.clone(), clock)
            .with_timeout(self.request_timeout);

        info!(
            "Running {} scenario against {} for {}s",
            scenario,
            self.target,
            duration.as_secs()
        );

        match scenario.pacing() {
            Pacing::FixedInterval(interval) => {
                self.run_fixed_interval(scenario, interval, &executor, clock, duration)
                    .await
            }
            Pacing::Burst => self.run_burst(&executor, clock, duration).await,
        }

        self.observer.on_finish();
        let elapsed = clock.elapsed();
        info!(
            "{} scenario finished: {} requests in {:.2}s",
            scenario,
            recorder.len(),
            elapsed.as_secs_f64()
        );

        recorder.finish(RunMetadata {
            target: self.target.clone(),
            scenario,
            requested_duration: duration,
            started_at,
            elapsed,
        })
    }

    /// Sequential dispatch-then-sleep until the window closes
    async fn run_fixed_interval(
        &self,
        scenario: Scenario,
        interval: Duration,
        executor: &RequestExecutor<T>,
        clock: Instant,
        duration: Duration,
    ) {
        // An unrepresentable end instant means the window never closes
        let end = clock.checked_add(duration);

        while end.map_or(true, |end| Instant::now() < end) {
            executor.execute().await;

            let counters = executor.recorder().counters();
            self.observer.on_sample(&ProgressUpdate {
                scenario,
                elapsed: clock.elapsed(),
                duration,
                completed: counters.total,
                planned: None,
                counters,
            });

            sleep(interval).await;
        }
    }

    /// Fixed request count over a bounded pool, then idle out the window
    async fn run_burst(&self, executor: &RequestExecutor<T>, clock: Instant, duration: Duration) {
        let BurstSettings {
            requests,
            workers,
            budget_secs,
        } = self.burst;
        info!(
            "Sending burst: {} requests across {} workers (target ~{}s)",
            requests, workers, budget_secs
        );

        let semaphore = Semaphore::new(workers.max(1));
        let semaphore = &semaphore;

        let mut tasks = FuturesUnordered::new();
        for _ in 0..requests {
            tasks.push(async move {
                let _permit = semaphore.acquire().await;
                executor.execute().await
            });
        }

        let mut completed = 0u64;
        while tasks.next().await.is_some() {
            completed += 1;
            let counters = executor.recorder().counters();
            self.observer.on_sample(&ProgressUpdate {
                scenario: Scenario::Burst,
                elapsed: clock.elapsed(),
                duration,
                completed,
                planned: Some(requests),
                counters,
            });
        }

        let dispatch_time = clock.elapsed();
        debug!("Burst dispatched in {:.2}s", dispatch_time.as_secs_f64());

        let residual = duration.saturating_sub(dispatch_time);
        if !residual.is_zero() {
            info!(
                "Burst complete. Waiting remaining duration ({:.1}s)...",
                residual.as_secs_f64()
            );
            sleep(residual).await;
        }
    }
}
