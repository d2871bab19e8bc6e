//! Target resolution
//!
//! The scheduler only needs a URL. When none is given, resolvers are tried
//! in order; the stock chain asks `kubectl` for the ingress address and
//! falls back to `gcloud` for a reserved address.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::DiscoveryConfig;
use crate::error::{ProbeError, Result};

/// Capability: produce the URL of the endpoint under test
#[async_trait]
pub trait TargetResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(&self) -> Result<String>;
}

/// Always returns the URL it was built with
#[derive(Debug, Clone)]
pub struct StaticResolver(pub String);

#[async_trait]
impl TargetResolver for StaticResolver {
    fn name(&self) -> &str {
        "static"
    }

    async fn resolve(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Runs an external tool and turns the address it prints into a URL
#[derive(Debug, Clone)]
pub struct CommandResolver {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandResolver {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Load balancer IP of a Kubernetes ingress
    pub fn kubectl_ingress(ingress: &str, timeout: Duration) -> Self {
        Self::new(
            "kubectl",
            vec![
                "get".to_string(),
                "ingress".to_string(),
                ingress.to_string(),
                "-o".to_string(),
                "jsonpath={.status.loadBalancer.ingress[0].ip}".to_string(),
            ],
            timeout,
        )
    }

    /// First reserved address in a GCP project matching `filter`
    pub fn gcloud_address(filter: &str, timeout: Duration) -> Self {
        Self::new(
            "gcloud",
            vec![
                "compute".to_string(),
                "addresses".to_string(),
                "list".to_string(),
                format!("--filter={}", filter),
                "--format=value(address)".to_string(),
            ],
            timeout,
        )
    }

    fn failure(&self, reason: impl std::fmt::Display) -> ProbeError {
        ProbeError::TargetResolution {
            attempts: vec![format!("{}: {}", self.program, reason)],
        }
    }
}

#[async_trait]
impl TargetResolver for CommandResolver {
    fn name(&self) -> &str {
        &self.program
    }

    async fn resolve(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(self.failure(format!("not available ({})", e))),
            Err(_) => return Err(self.failure("timed out")),
        };

        if !output.status.success() {
            return Err(self.failure(format!("exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let address = parse_address(&stdout).ok_or_else(|| self.failure("no address in output"))?;
        info!("Found load balancer IP via {}: {}", self.program, address);
        Ok(format!("http://{}", address))
    }
}

/// First whitespace-separated token, if any
fn parse_address(stdout: &str) -> Option<&str> {
    stdout.split_whitespace().next()
}

/// Tries resolvers in order, returning the first success
pub struct ChainResolver {
    resolvers: Vec<Box<dyn TargetResolver>>,
}

impl ChainResolver {
    pub fn new(resolvers: Vec<Box<dyn TargetResolver>>) -> Self {
        Self { resolvers }
    }

    /// kubectl ingress lookup, then gcloud address lookup
    pub fn from_discovery(config: &DiscoveryConfig) -> Self {
        let timeout = Duration::from_secs(config.command_timeout_secs);
        Self::new(vec![
            Box::new(CommandResolver::kubectl_ingress(&config.ingress_name, timeout)),
            Box::new(CommandResolver::gcloud_address(&config.address_filter, timeout)),
        ])
    }
}

#[async_trait]
impl TargetResolver for ChainResolver {
    fn name(&self) -> &str {
        "chain"
    }

    async fn resolve(&self) -> Result<String> {
        let mut attempts = Vec::new();

        for resolver in &self.resolvers {
            match resolver.resolve().await {
                Ok(url) => return Ok(url),
                Err(ProbeError::TargetResolution { attempts: failed }) => {
                    warn!("{} could not resolve a target", resolver.name());
                    attempts.extend(failed);
                }
                Err(e) => {
                    warn!("{} could not resolve a target: {}", resolver.name(), e);
                    attempts.push(format!("{}: {}", resolver.name(), e));
                }
            }
        }

        Err(ProbeError::TargetResolution { attempts })
    }
}
