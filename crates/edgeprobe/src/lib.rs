//! # edgeprobe
//!
//! Paced HTTP traffic generator for observing whether, and when, an edge
//! rate-limiting policy starts rejecting requests.
//!
//! ## Features
//!
//! - **Load shapes**: baseline (20 req/min), sustained (60 req/min),
//!   rate-limit (150 req/min) and a 200-request concurrent burst
//! - **Per-request samples**: every dispatched request is recorded, including
//!   timeouts and transport errors
//! - **Statistics**: status distribution, nearest-rank latency percentiles,
//!   block-onset detection
//! - **Exports**: JSON document and CSV rows per run
//!
//! ## Usage
//!
//! ```bash
//! # Auto-detect the endpoint and run the rate-limit scenario
//! edgeprobe --scenario rate-limit --duration 120
//!
//! # Explicit endpoint
//! edgeprobe --target http://34.120.45.67 --scenario burst
//! ```
//!
//! ## Flow
//!
//! ```text
//!   Scheduler ──► RequestExecutor ──► Recorder ──► Run ──► RunStatistics ──► report / export
//!       │                                 │
//!       └──── ProgressObserver ◄──────────┘ (counters)
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod export;
pub mod probe;
pub mod progress;
pub mod recorder;
pub mod report;
pub mod resolver;
pub mod sample;
pub mod scheduler;
pub mod stats;

pub use config::{DiscoveryConfig, ProbeConfig};
pub use error::{ProbeError, Result};
pub use executor::{Exchange, HttpTransport, RequestExecutor, Transport};
pub use export::{ExportPaths, Exporter};
pub use probe::{Probe, ProbeReport};
pub use progress::{ConsoleProgress, ProgressObserver, ProgressUpdate, SilentProgress};
pub use recorder::{Counters, Recorder, Run, RunMetadata};
pub use resolver::{ChainResolver, CommandResolver, StaticResolver, TargetResolver};
pub use sample::{Outcome, Sample, Status, StatusBucket};
pub use scheduler::{BurstSettings, Pacing, Scenario, Scheduler};
pub use stats::{percentile, BlockOnset, LatencySummary, RunStatistics};
