//! Per-request samples and their classification

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Status codes that mean the edge defense rejected the request
pub const BLOCKED_CODES: [u16; 2] = [403, 429];

/// How a single request resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// An HTTP response was received
    Code(u16),
    /// The per-request timeout expired
    Timeout,
    /// Connection refused, DNS failure, protocol error, ...
    Error(String),
}

impl Status {
    /// Histogram key for this status (error details collapse into one bucket)
    pub fn bucket(&self) -> StatusBucket {
        match self {
            Status::Code(code) => StatusBucket::Code(*code),
            Status::Timeout => StatusBucket::Timeout,
            Status::Error(_) => StatusBucket::Error,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Status::Code(code) if BLOCKED_CODES.contains(code))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Code(code) => write!(f, "{}", code),
            Status::Timeout => f.write_str("TIMEOUT"),
            Status::Error(detail) => write!(f, "ERROR: {}", detail),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Status::Code(code) => serializer.serialize_u16(*code),
            other => serializer.collect_str(other),
        }
    }
}

/// Key of the status distribution.
///
/// Ordering puts numeric codes first (ascending), then `TIMEOUT`, then `ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusBucket {
    Code(u16),
    Timeout,
    Error,
}

impl fmt::Display for StatusBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusBucket::Code(code) => write!(f, "{}", code),
            StatusBucket::Timeout => f.write_str("TIMEOUT"),
            StatusBucket::Error => f.write_str("ERROR"),
        }
    }
}

// Serialized as a string so it can key a JSON object.
impl Serialize for StatusBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Exclusive classification of a sample. Every sample lands in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx response
    Success,
    /// 403 or 429 response
    Blocked,
    /// Any other HTTP response (3xx, 404, 5xx, ...)
    Other,
    Timeout,
    Error,
}

/// One recorded outcome of a single dispatched request
#[derive(Debug, Clone)]
pub struct Sample {
    /// Wall-clock dispatch time
    pub issued_at: DateTime<Utc>,
    /// Monotonic dispatch time relative to run start
    pub offset: Duration,
    pub status: Status,
    /// Round-trip time; zero for timeouts and errors
    pub latency: Duration,
    pub blocked: bool,
}

impl Sample {
    /// Build a sample, deriving `blocked` from the status and zeroing the
    /// latency when no response was received.
    pub fn new(issued_at: DateTime<Utc>, offset: Duration, status: Status, latency: Duration) -> Self {
        let latency = match status {
            Status::Code(_) => latency,
            Status::Timeout | Status::Error(_) => Duration::ZERO,
        };
        Self {
            issued_at,
            offset,
            blocked: status.is_blocked(),
            status,
            latency,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self.status {
            Status::Code(_) if self.blocked => Outcome::Blocked,
            Status::Code(code) if (200..300).contains(&code) => Outcome::Success,
            Status::Code(_) => Outcome::Other,
            Status::Timeout => Outcome::Timeout,
            Status::Error(_) => Outcome::Error,
        }
    }

    /// Latency if the request received a response at all
    pub fn response_latency(&self) -> Option<Duration> {
        match self.status {
            Status::Code(_) => Some(self.latency),
            _ => None,
        }
    }
}
