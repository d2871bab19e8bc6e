//! # edgeprobe CLI
//!
//! Command-line entry point for probing an edge rate-limiting policy.
//!
//! ## Usage
//!
//! ```bash
//! # Auto-detect endpoint and run rate-limit test
//! edgeprobe --scenario rate-limit --duration 120
//!
//! # Specify endpoint manually
//! edgeprobe --target http://34.120.45.67 --scenario burst
//!
//! # Baseline test (should not trigger blocking)
//! edgeprobe --scenario baseline --duration 300
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use edgeprobe::{ConsoleProgress, Probe, ProbeConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG: &str = "edgeprobe.toml";

#[derive(Parser)]
#[command(name = "edgeprobe")]
#[command(version)]
#[command(about = "Load generator for observing edge rate-limit enforcement", long_about = None)]
#[command(after_help = "Scenarios:
  baseline    - Normal traffic (20 req/min), should NOT trigger blocking
  sustained   - Moderate traffic (60 req/min), stability test
  rate-limit  - Aggressive traffic (150 req/min), WILL trigger blocking
  burst       - Sudden spike (200 req in ~10s), immediate blocking")]
struct Cli {
    /// Target URL (auto-detected if not provided)
    #[arg(short, long)]
    target: Option<String>,

    /// Test scenario to run [default: rate-limit]
    #[arg(short, long)]
    scenario: Option<String>,

    /// Test duration in seconds [default: 120]
    #[arg(short, long)]
    duration: Option<u64>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for exported results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Skip writing JSON/CSV exports
    #[arg(long)]
    no_export: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::load(path, true)?,
            None => ProbeConfig::load(&PathBuf::from(DEFAULT_CONFIG), false)?,
        };

        if let Some(target) = &self.target {
            config.target = Some(target.clone());
        }
        if let Some(scenario) = &self.scenario {
            config.scenario = scenario.clone();
        }
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if self.no_export {
            config.export = false;
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.load_config()?;

    let resolver = Probe::resolver_for(&config);
    let probe = Probe::prepare(config, resolver.as_ref()).await?;

    print!("{}", probe.banner());
    info!("Running {} scenario", probe.scenario());

    let report = probe.run(Arc::new(ConsoleProgress::new())).await?;
    print!("{}", report.render());

    if let Some(paths) = &report.exports {
        println!("Detailed results exported to: {}", paths.json.display());
        println!("Summary exported to: {}", paths.csv.display());
    }

    Ok(())
}
