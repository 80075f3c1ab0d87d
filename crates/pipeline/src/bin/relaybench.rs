//! relaybench: run one pipeline scenario and write its report
//!
//! ```text
//! relaybench configs/baseline.json results --duration-secs 5
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relaybench_pipeline::config::PipelineConfig;
use relaybench_pipeline::report::{execute, Scenario};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "relaybench", version, about = "Three-stage message pipeline latency benchmark")]
struct Cli {
    /// Scenario configuration (JSON); its file stem names the output files
    config: PathBuf,
    /// Directory receiving `<scenario>_log.txt` and `<scenario>_summary.txt`
    #[arg(default_value = "results")]
    output_dir: PathBuf,
    /// Override the configured run duration
    #[arg(long)]
    duration_secs: Option<u64>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    #[cfg(feature = "ftlog")]
    let _log_guard = relaybench_core::logging::init_ftlog().map_err(anyhow::Error::msg)?;
    #[cfg(not(feature = "ftlog"))]
    relaybench_core::logging::init_logging_with(&cli.log_level);

    let mut config = PipelineConfig::from_file(&cli.config)
        .with_context(|| format!("loading scenario {}", cli.config.display()))?
        .with_env_overrides()?;
    if let Some(secs) = cli.duration_secs {
        config = config.with_duration_secs(secs);
    }

    let scenario = Scenario::from_paths(&cli.config, &cli.output_dir)?;
    let summary_path = scenario.summary_path();
    let report = execute(config, scenario).context("pipeline run failed")?;

    if !report.outcome.is_balanced() {
        warn!(
            "counter balance off: produced {} != delivered {} + residual {} + abandoned {}",
            report.summary.produced,
            report.summary.delivered,
            report.outcome.residual(),
            report.summary.abandoned
        );
    }

    println!("{}", report.summary);
    info!("Summary written to {}", summary_path.display());
    Ok(())
}
