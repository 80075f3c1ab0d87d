//! Run artifacts
//!
//! A scenario named after its configuration file writes three files into the
//! output directory:
//!
//! - `<scenario>_log.txt`: one progress line per monitor sample
//! - `<scenario>_summary.txt`: totals and the latency percentile table
//! - `<scenario>_summary.json`: the same summary, machine readable

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use relaybench_core::{RunId, Timestamp};
use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result};
use crate::latency::LatencySummary;
use crate::monitor::MonitorSample;
use crate::pipeline::{Pipeline, RunOutcome};

/// Scenario name and artifact locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub output_dir: PathBuf,
}

impl Scenario {
    /// Name the scenario after the config file's stem and create the output
    /// directory if it does not exist.
    pub fn from_paths(config_path: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let name = config_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| {
                PipelineError::InvalidConfig(format!("cannot derive a scenario name from {}", config_path.display()))
            })?;

        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir).map_err(|e| PipelineError::output(&output_dir, e))?;

        Ok(Self { name, output_dir })
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_log.txt", self.name))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_summary.txt", self.name))
    }

    pub fn summary_json_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_summary.json", self.name))
    }
}

/// Line-oriented progress log.
///
/// Used as the monitor sink, which cannot fail, so the first write error is
/// kept and reported by [`ProgressLog::finish`].
pub struct ProgressLog {
    path: PathBuf,
    writer: BufWriter<File>,
    error: Option<io::Error>,
}

impl ProgressLog {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| PipelineError::output(&path, e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            error: None,
        })
    }

    pub fn write_sample(&mut self, sample: &MonitorSample) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.writer, "{sample}").and_then(|_| self.writer.flush()) {
            self.error = Some(e);
        }
    }

    pub fn finish(mut self) -> Result<()> {
        if let Some(e) = self.error.take() {
            return Err(PipelineError::output(&self.path, e));
        }
        self.writer.flush().map_err(|e| PipelineError::output(&self.path, e))
    }
}

/// Final statistics of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub run_id: RunId,
    pub started_at: Timestamp,
    pub duration_secs: u64,
    pub produced: u64,
    pub processed: u64,
    pub delivered: u64,
    pub abandoned: u64,
    pub residual_stage1: u64,
    pub residual_stage2: u64,
    pub latency: LatencySummary,
}

impl RunSummary {
    pub fn new(scenario: &Scenario, config: &PipelineConfig, outcome: &RunOutcome, started_at: Timestamp) -> Self {
        Self {
            scenario: scenario.name.clone(),
            run_id: RunId::new(),
            started_at,
            duration_secs: config.duration_secs,
            produced: outcome.counters.produced,
            processed: outcome.counters.processed,
            delivered: outcome.counters.delivered,
            abandoned: outcome.counters.abandoned,
            residual_stage1: outcome.residual_stage1,
            residual_stage2: outcome.residual_stage2,
            latency: outcome.latency,
        }
    }

    pub fn write_text(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string()).map_err(|e| PipelineError::output(path, e))
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| PipelineError::output(path, e))
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== PERFORMANCE SUMMARY ===")?;
        writeln!(f, "Scenario: {}", self.scenario)?;
        writeln!(f, "Run: {}", self.run_id)?;
        writeln!(f, "Started: {}", self.started_at)?;
        writeln!(f, "Duration: {} seconds", self.duration_secs)?;
        writeln!(f, "Produced:  {}", self.produced)?;
        writeln!(f, "Processed: {}", self.processed)?;
        writeln!(f, "Delivered: {}", self.delivered)?;
        writeln!(f, "Abandoned: {} (counted in Produced, dropped at shutdown)", self.abandoned)?;
        writeln!(
            f,
            "Residual:  {} (stage1 {}, stage2 {})",
            self.residual_stage1 + self.residual_stage2,
            self.residual_stage1,
            self.residual_stage2
        )?;
        writeln!(f)?;
        writeln!(f, "Latency Percentiles (μs), {} samples:", self.latency.samples)?;
        write!(f, "{}", self.latency)
    }
}

/// Summary plus the full outcome of a scenario run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub summary: RunSummary,
    pub outcome: RunOutcome,
}

/// Load `config_path`, run it, and write all artifacts into `output_dir`.
///
/// A missing or unreadable configuration fails before any runner exists.
pub fn run_scenario(config_path: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Result<ScenarioReport> {
    let config = PipelineConfig::from_file(config_path.as_ref())?.with_env_overrides()?;
    let scenario = Scenario::from_paths(config_path, output_dir)?;
    execute(config, scenario)
}

/// Run an already loaded configuration as `scenario`.
pub fn execute(config: PipelineConfig, scenario: Scenario) -> Result<ScenarioReport> {
    info!("Running scenario: {}", scenario.name);
    let pipeline = Pipeline::build(config.clone())?;
    let mut log = ProgressLog::create(scenario.log_path())?;

    let started_at = Timestamp::now();
    let outcome = pipeline.run(|sample| log.write_sample(sample))?;
    log.finish()?;

    let summary = RunSummary::new(&scenario, &config, &outcome, started_at);
    summary.write_text(&scenario.summary_path())?;
    summary.write_json(&scenario.summary_json_path())?;
    info!(
        "Scenario {} complete. Results written to {}",
        scenario.name,
        scenario.summary_path().display()
    );

    Ok(ScenarioReport {
        scenario,
        summary,
        outcome,
    })
}
