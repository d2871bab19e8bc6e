//! Error types for edgeprobe
//!
//! Per-request transport failures are not errors at this level: the executor
//! folds timeouts and connection failures into [`crate::sample::Status`] so a
//! run never aborts because of one bad request. Everything here is fatal to
//! the operation that produced it.

use thiserror::Error;

/// Result type alias for edgeprobe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors that can occur while preparing, running or exporting a probe run
#[derive(Error, Debug)]
pub enum ProbeError {
    // === Startup ===
    /// No target was supplied and every discovery mechanism failed
    #[error("No target URL provided and auto-detection failed ({})", attempts.join("; "))]
    TargetResolution { attempts: Vec<String> },

    /// Scenario name is not one of the known load shapes
    #[error("Unknown scenario '{0}' (available: baseline, sustained, rate-limit, burst)")]
    InvalidScenario(String),

    /// Configuration values are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    // === Export ===
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_resolution_lists_attempts() {
        let err = ProbeError::TargetResolution {
            attempts: vec![
                "kubectl: not installed".to_string(),
                "gcloud: empty output".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("kubectl: not installed"));
        assert!(msg.contains("gcloud: empty output"));
    }

    #[test]
    fn test_invalid_scenario_names_choices() {
        let msg = ProbeError::InvalidScenario("flood".to_string()).to_string();
        assert!(msg.contains("flood"));
        assert!(msg.contains("rate-limit"));
    }
}
