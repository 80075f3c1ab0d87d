//! Shared fixtures for the relaybench integration tests

use std::fs;
use std::path::{Path, PathBuf};

use relaybench_pipeline::config::PipelineConfig;
use relaybench_pipeline::shared::CounterSnapshot;

/// Small, fast configuration: short monitor interval, small rings
pub fn quick_config(producers: usize, processors: usize, strategies: usize) -> PipelineConfig {
    PipelineConfig::new(producers, processors, strategies)
        .with_duration_secs(1)
        .with_monitor_interval_ms(100)
        .with_queue_capacity(1024)
}

/// Write `json` as `<dir>/<name>.json` and return its path
pub fn write_scenario(dir: &Path, name: &str, json: &str) -> PathBuf {
    let path = dir.join(format!("{name}.json"));
    fs::write(&path, json).expect("write scenario file");
    path
}

/// delivered <= processed <= produced
pub fn counters_ordered(counters: &CounterSnapshot) -> bool {
    counters.delivered <= counters.processed && counters.processed <= counters.produced
}

pub fn init_test_logging() {
    relaybench_core::init_logging();
}
