//! Dedicated runner threads
//!
//! Every pipeline runner owns one OS thread for its whole life:
//! - Named threads so stalls show up clearly in profilers
//! - Optional CPU binding for latency consistency
//! - No async executor; runners busy-poll their queues

use std::io;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::cpu::bind_to_cpu_set;

/// Runner thread configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Thread name
    pub thread_name: String,
    /// CPU core to bind to (None for no binding)
    pub cpu_core: Option<usize>,
    /// Runner thread stack size
    pub stack_size: Option<usize>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            thread_name: "relaybench-runner".to_string(),
            cpu_core: None,
            stack_size: Some(2 * 1024 * 1024), // 2MB stack
        }
    }
}

impl RunnerConfig {
    /// Create a configuration for a named runner thread
    pub fn named(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
            ..Default::default()
        }
    }

    pub fn with_cpu_core(mut self, core: Option<usize>) -> Self {
        self.cpu_core = core;
        self
    }
}

/// Spawn `f` on a dedicated, optionally core-bound thread.
///
/// A failed core binding is logged and the runner still starts.
pub fn spawn_runner<F, T>(config: RunnerConfig, f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut builder = thread::Builder::new().name(config.thread_name.clone());
    if let Some(stack_size) = config.stack_size {
        builder = builder.stack_size(stack_size);
    }

    builder.spawn(move || {
        if let Some(cpu_core) = config.cpu_core {
            if let Err(e) = bind_to_cpu_set(cpu_core) {
                warn!("{}: failed to bind to CPU core {}: {}", config.thread_name, cpu_core, e);
            }
        }
        debug!("▶️  {} started", config.thread_name);
        let result = f();
        debug!("⏹️  {} stopped", config.thread_name);
        result
    })
}
