//! Error types for pipeline setup and reporting
//!
//! Only startup and output failures are errors. A full queue is
//! backpressure, handled by the runners' retry loops, and never surfaces here.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Which hop of the pipeline a routing rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Producer -> processor
    One,
    /// Processor -> strategy
    Two,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::One => write!(f, "stage1"),
            Stage::Two => write!(f, "stage2"),
        }
    }
}

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cannot open config file {}: {source}", path.display())]
    ConfigOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("{stage} rule for msg_type {msg_type} routes to destination {destination}, but only {available} exist")]
    RouteOutOfRange {
        stage: Stage,
        msg_type: usize,
        destination: usize,
        available: usize,
    },

    #[error("{stage} rule names msg_type {msg_type}, but only {types} message types are configured")]
    MessageTypeOutOfRange {
        stage: Stage,
        msg_type: usize,
        types: usize,
    },

    #[error("Failed to spawn runner thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Runner panicked: {0}")]
    RunnerPanicked(String),

    #[error("Cannot write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }
}
