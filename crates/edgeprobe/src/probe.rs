//! End-to-end probe: validate, resolve, run, analyse, export

use std::sync::Arc;

use chrono::Local;
use tracing::info;

use crate::config::ProbeConfig;
use crate::error::Result;
use crate::executor::HttpTransport;
use crate::export::{ExportPaths, Exporter};
use crate::progress::ProgressObserver;
use crate::recorder::Run;
use crate::report;
use crate::resolver::{ChainResolver, StaticResolver, TargetResolver};
use crate::scheduler::{Scenario, Scheduler};
use crate::stats::RunStatistics;

/// Result of a completed probe
#[derive(Debug)]
pub struct ProbeReport {
    pub run: Run,
    pub stats: RunStatistics,
    pub exports: Option<ExportPaths>,
}

impl ProbeReport {
    pub fn render(&self) -> String {
        report::render(&self.run.metadata, &self.stats)
    }
}

/// A validated configuration bound to a resolved target
#[derive(Debug, Clone)]
pub struct Probe {
    config: ProbeConfig,
    scenario: Scenario,
    target: String,
}

impl Probe {
    /// Resolver used when the configuration does not name a target
    pub fn resolver_for(config: &ProbeConfig) -> Box<dyn TargetResolver> {
        match &config.target {
            Some(target) => Box::new(StaticResolver(target.clone())),
            None => {
                info!("Auto-detecting load balancer endpoint...");
                Box::new(ChainResolver::from_discovery(&config.discovery))
            }
        }
    }

    /// Validate `config` and resolve the target.
    ///
    /// Validation runs first, so an invalid scenario never triggers discovery.
    pub async fn prepare(config: ProbeConfig, resolver: &dyn TargetResolver) -> Result<Self> {
        let scenario = config.validate()?;
        let target = resolver.resolve().await?;
        Ok(Self {
            config,
            scenario,
            target,
        })
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn banner(&self) -> String {
        report::render_banner(&self.target, self.scenario, self.config.duration(), Local::now())
    }

    /// Run the scenario, compute statistics and export once the run is frozen
    pub async fn run(&self, observer: Arc<dyn ProgressObserver>) -> Result<ProbeReport> {
        let transport = HttpTransport::new(
            self.config.request_timeout(),
            &self.config.user_agent,
            self.config.burst.workers,
        )?;

        let scheduler = Scheduler::new(transport, self.target.clone())
            .with_request_timeout(self.config.request_timeout())
            .with_burst(self.config.burst)
            .with_observer(observer);

        let run = scheduler.run(self.scenario, self.config.duration()).await;
        let stats = RunStatistics::from_run(&run);

        let exports = if self.config.export {
            Some(Exporter::new(&self.config.output_dir).export(&run, &stats)?)
        } else {
            None
        };

        Ok(ProbeReport { run, stats, exports })
    }
}
