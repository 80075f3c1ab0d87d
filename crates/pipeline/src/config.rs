//! Scenario configuration
//!
//! Scenarios are JSON files. Unknown fields are ignored and missing routing
//! rules leave their message type on destination 0.
//!
//! ```json
//! {
//!   "duration_secs": 10,
//!   "producers":  { "count": 2 },
//!   "processors": { "count": 2 },
//!   "strategies": { "count": 1 },
//!   "stage1_rules": [ { "msg_type": 0, "destination_processor": 1 } ],
//!   "stage2_rules": [ { "msg_type": 0, "destination_strategy": 0 } ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::backoff::WaitStrategy;
use crate::errors::{PipelineError, Result};

/// Environment variable overriding `duration_secs`
pub const DURATION_ENV: &str = "RELAYBENCH_DURATION_SECS";

/// Highest number of message types a `u8` type tag can carry
pub const MAX_MESSAGE_TYPES: usize = 256;

fn default_message_types() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1 << 14
}

fn default_monitor_interval_ms() -> u64 {
    1000
}

/// Producer stage settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProducerConfig {
    pub count: usize,
    /// One weight per message type; empty means uniform
    #[serde(default)]
    pub type_weights: Vec<u32>,
    /// Base seed; producer `i` uses `seed + i`, or `i + 1` when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Processor or strategy stage settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StageConfig {
    pub count: usize,
    /// Simulated work per message, in nanoseconds
    #[serde(default)]
    pub work_ns: u64,
}

/// Stage-1 rule: message type -> processor.
///
/// Accepts either `destination_processor` or the list form
/// `processors: [p, ...]`, in which case the first entry wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Stage1Rule {
    pub msg_type: usize,
    #[serde(default, alias = "processor")]
    pub destination_processor: Option<usize>,
    #[serde(default)]
    pub processors: Vec<usize>,
}

impl Stage1Rule {
    pub fn new(msg_type: usize, destination_processor: usize) -> Self {
        Self {
            msg_type,
            destination_processor: Some(destination_processor),
            processors: Vec::new(),
        }
    }

    pub fn destination(&self) -> Option<usize> {
        self.destination_processor
            .or_else(|| self.processors.first().copied())
    }
}

/// Stage-2 rule: message type -> strategy
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Stage2Rule {
    pub msg_type: usize,
    #[serde(alias = "strategy")]
    pub destination_strategy: usize,
}

impl Stage2Rule {
    pub fn new(msg_type: usize, destination_strategy: usize) -> Self {
        Self {
            msg_type,
            destination_strategy,
        }
    }
}

/// Full pipeline configuration, immutable once the pipeline is built
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    pub duration_secs: u64,
    pub producers: ProducerConfig,
    pub processors: StageConfig,
    pub strategies: StageConfig,
    #[serde(default)]
    pub stage1_rules: Vec<Stage1Rule>,
    #[serde(default)]
    pub stage2_rules: Vec<Stage2Rule>,
    #[serde(default = "default_message_types")]
    pub message_types: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub wait: WaitStrategy,
    #[serde(default)]
    pub cpu_binding: bool,
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
}

impl PipelineConfig {
    /// Minimal configuration with default routing and queue settings
    pub fn new(producers: usize, processors: usize, strategies: usize) -> Self {
        Self {
            duration_secs: 1,
            producers: ProducerConfig {
                count: producers,
                type_weights: Vec::new(),
                seed: None,
            },
            processors: StageConfig {
                count: processors,
                work_ns: 0,
            },
            strategies: StageConfig {
                count: strategies,
                work_ns: 0,
            },
            stage1_rules: Vec::new(),
            stage2_rules: Vec::new(),
            message_types: default_message_types(),
            queue_capacity: default_queue_capacity(),
            wait: WaitStrategy::default(),
            cpu_binding: false,
            monitor_interval_ms: default_monitor_interval_ms(),
        }
    }

    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PipelineError::ConfigOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        info!("📄 Loaded config {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_stage1_rule(mut self, msg_type: usize, processor: usize) -> Self {
        self.stage1_rules.push(Stage1Rule::new(msg_type, processor));
        self
    }

    pub fn with_stage2_rule(mut self, msg_type: usize, strategy: usize) -> Self {
        self.stage2_rules.push(Stage2Rule::new(msg_type, strategy));
        self
    }

    pub fn with_message_types(mut self, types: usize) -> Self {
        self.message_types = types;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_processor_work_ns(mut self, work_ns: u64) -> Self {
        self.processors.work_ns = work_ns;
        self
    }

    pub fn with_strategy_work_ns(mut self, work_ns: u64) -> Self {
        self.strategies.work_ns = work_ns;
        self
    }

    pub fn with_monitor_interval_ms(mut self, interval_ms: u64) -> Self {
        self.monitor_interval_ms = interval_ms;
        self
    }

    /// Apply `RELAYBENCH_DURATION_SECS` if set
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(DURATION_ENV) {
            self.duration_secs = value.trim().parse().map_err(|_| {
                PipelineError::InvalidConfig(format!("{DURATION_ENV}={value} is not a number of seconds"))
            })?;
        }
        Ok(self)
    }

    /// Number of monitor samples taken over the run
    pub fn monitor_ticks(&self) -> u64 {
        let interval = self.monitor_interval_ms.max(1);
        self.duration_secs.saturating_mul(1000).div_ceil(interval)
    }

    /// Check everything except routing destinations, which the routing
    /// table validates against the stage sizes.
    pub fn validate(&self) -> Result<()> {
        for (stage, count) in [
            ("producers", self.producers.count),
            ("processors", self.processors.count),
            ("strategies", self.strategies.count),
        ] {
            if count == 0 {
                return Err(PipelineError::InvalidConfig(format!("{stage}.count must be at least 1")));
            }
            if u32::try_from(count).is_err() {
                return Err(PipelineError::InvalidConfig(format!("{stage}.count {count} is too large")));
            }
        }

        if self.message_types == 0 || self.message_types > MAX_MESSAGE_TYPES {
            return Err(PipelineError::InvalidConfig(format!(
                "message_types must be in 1..={MAX_MESSAGE_TYPES}, got {}",
                self.message_types
            )));
        }

        if self.queue_capacity < 2 || !self.queue_capacity.is_power_of_two() {
            return Err(PipelineError::InvalidConfig(format!(
                "queue_capacity must be a power of two of at least 2, got {}",
                self.queue_capacity
            )));
        }

        let weights = &self.producers.type_weights;
        if !weights.is_empty() {
            if weights.len() != self.message_types {
                return Err(PipelineError::InvalidConfig(format!(
                    "producers.type_weights has {} entries for {} message types",
                    weights.len(),
                    self.message_types
                )));
            }
            if weights.iter().all(|&w| w == 0) {
                return Err(PipelineError::InvalidConfig(
                    "producers.type_weights must have a positive sum".to_string(),
                ));
            }
        }

        if self.duration_secs.checked_mul(1000).is_none() {
            return Err(PipelineError::InvalidConfig(format!(
                "duration_secs {} does not fit in milliseconds",
                self.duration_secs
            )));
        }

        if self.monitor_interval_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "monitor_interval_ms must be at least 1".to_string(),
            ));
        }

        if let Some(rule) = self.stage1_rules.iter().find(|r| r.destination().is_none()) {
            return Err(PipelineError::InvalidConfig(format!(
                "stage1 rule for msg_type {} names no processor",
                rule.msg_type
            )));
        }

        Ok(())
    }
}
