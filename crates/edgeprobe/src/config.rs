//! Probe configuration
//!
//! Loaded from an optional TOML file, then overridden by command-line flags.
//!
//! ```toml
//! target = "http://34.120.45.67"
//! scenario = "rate-limit"
//! duration_secs = 120
//!
//! [burst]
//! requests = 200
//! workers = 20
//!
//! [discovery]
//! ingress_name = "tasky-ingress"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};
use crate::scheduler::{BurstSettings, Scenario};

/// Complete probe configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Target URL; discovered when absent
    pub target: Option<String>,

    /// Load shape name
    pub scenario: String,

    /// Run window in seconds
    pub duration_secs: u64,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Directory export files are written to
    pub output_dir: PathBuf,

    /// Write JSON/CSV exports after the run
    pub export: bool,

    /// Burst shape parameters
    pub burst: BurstSettings,

    /// Target auto-detection
    pub discovery: DiscoveryConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target: None,
            scenario: Scenario::RateLimit.to_string(),
            duration_secs: 120,
            request_timeout_secs: 5,
            user_agent: format!("edgeprobe/{}", env!("CARGO_PKG_VERSION")),
            output_dir: PathBuf::from("."),
            export: true,
            burst: BurstSettings::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// External tooling used to find the target when none is given
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Timeout per discovery command, seconds
    pub command_timeout_secs: u64,

    /// Ingress queried with kubectl
    pub ingress_name: String,

    /// `--filter` passed to `gcloud compute addresses list`
    pub address_filter: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 10,
            ingress_name: "tasky-ingress".to_string(),
            address_filter: "name:tasky".to_string(),
        }
    }
}

impl ProbeConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`. A missing file is only tolerated when `required` is false.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parsed scenario; fails on unknown names
    pub fn scenario(&self) -> Result<Scenario> {
        self.scenario.parse()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject anything that would make a run meaningless
    pub fn validate(&self) -> Result<Scenario> {
        let scenario = self.scenario()?;

        if self.duration_secs == 0 {
            return Err(ProbeError::InvalidConfig("duration must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ProbeError::InvalidConfig("request timeout must be positive".to_string()));
        }
        if self.burst.workers == 0 {
            return Err(ProbeError::InvalidConfig("burst workers must be positive".to_string()));
        }
        if let Some(target) = &self.target {
            if !(target.starts_with("http://") || target.starts_with("https://")) {
                return Err(ProbeError::InvalidConfig(format!(
                    "target '{}' must be an http:// or https:// URL",
                    target
                )));
            }
        }

        Ok(scenario)
    }
}
