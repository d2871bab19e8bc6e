//! Request execution: one timed GET in, one recorded [`Sample`] out

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;
use crate::recorder::Recorder;
use crate::sample::{Sample, Status};

/// Per-request ceiling applied on top of whatever the transport enforces
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// What a transport observed for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub status: Status,
    pub latency: Duration,
}

impl Exchange {
    pub fn response(code: u16, latency: Duration) -> Self {
        Self {
            status: Status::Code(code),
            latency,
        }
    }

    pub fn timeout() -> Self {
        Self {
            status: Status::Timeout,
            latency: Duration::ZERO,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: Status::Error(detail.into()),
            latency: Duration::ZERO,
        }
    }
}

/// Something that can perform a GET against a target.
///
/// Implementations must not fail: every failure mode is an [`Exchange`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, target: &str) -> Exchange;
}

/// reqwest-backed transport. The client pools connections, so one instance
/// is shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str, max_idle: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(max_idle)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, target: &str) -> Exchange {
        let start = Instant::now();

        match self.client.get(target).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                // Round trip includes the body, like a browser would see it
                match response.bytes().await {
                    Err(e) if e.is_timeout() => Exchange::timeout(),
                    _ => Exchange::response(code, start.elapsed()),
                }
            }
            Err(e) if e.is_timeout() => Exchange::timeout(),
            Err(e) => Exchange::error(describe(&e)),
        }
    }
}

/// Short diagnostic for a transport failure
fn describe(err: &reqwest::Error) -> String {
    let kind = if err.is_connect() {
        "connect"
    } else if err.is_request() {
        "request"
    } else if err.is_body() || err.is_decode() {
        "body"
    } else {
        "transport"
    };

    match std::error::Error::source(err) {
        Some(source) => format!("{}: {}", kind, source),
        None => format!("{}: {}", kind, err),
    }
}

/// Executes requests against one fixed target and records every outcome
pub struct RequestExecutor<T> {
    transport: Arc<T>,
    target: String,
    recorder: Arc<Recorder>,
    clock: Instant,
    timeout: Duration,
}

impl<T: Transport> RequestExecutor<T> {
    /// `clock` is the run start; sample offsets are measured from it.
    pub fn new(transport: Arc<T>, target: impl Into<String>, recorder: Arc<Recorder>, clock: Instant) -> Self {
        Self {
            transport,
            target: target.into(),
            recorder,
            clock,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    /// Send one request. Exactly one sample is appended to the recorder.
    pub async fn execute(&self) -> Sample {
        let offset = self.clock.elapsed();
        let issued_at = Utc::now();

        let exchange = match tokio::time::timeout(self.timeout, self.transport.fetch(&self.target)).await {
            Ok(exchange) => exchange,
            Err(_) => Exchange::timeout(),
        };

        debug!(
            "{} -> {} in {:.2}ms",
            self.target,
            exchange.status,
            exchange.latency.as_secs_f64() * 1000.0
        );

        let sample = Sample::new(issued_at, offset, exchange.status, exchange.latency);
        self.recorder.record(sample.clone());
        sample
    }
}
