//! Latency sampling and percentile summaries
//!
//! Strategy runners append to one lock-protected recorder. It sits after the
//! two lock-free hops, where message volume is lowest, and it is only read
//! once every runner has been joined.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

/// The four latency series, in microseconds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencySeries {
    pub stage1_us: Vec<f64>,
    pub processing_us: Vec<f64>,
    pub stage2_us: Vec<f64>,
    pub total_us: Vec<f64>,
}

impl LatencySeries {
    pub fn len(&self) -> usize {
        self.total_us.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_us.is_empty()
    }
}

/// Shared append-only latency recorder
#[derive(Debug, Default)]
pub struct LatencyRecorder {
    series: Mutex<LatencySeries>,
}

impl LatencyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample to each series under a single lock
    pub fn record(&self, stage1: f64, processing: f64, stage2: f64, total: f64) {
        let mut series = self.lock();
        series.stage1_us.push(stage1);
        series.processing_us.push(processing);
        series.stage2_us.push(stage2);
        series.total_us.push(total);
    }

    /// Take the samples out, leaving the recorder empty
    pub fn take(&self) -> LatencySeries {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, LatencySeries> {
        // A panicking strategy leaves at worst a partially pushed sample;
        // the data is still usable.
        self.series.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Nearest-rank percentile.
///
/// Sorts `samples` in place and returns the element at index
/// `floor(p * len)`, clamped to the last element. An empty series yields 0.0.
pub fn percentile(samples: &mut [f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.sort_by(f64::total_cmp);
    let rank = (p * samples.len() as f64) as usize;
    samples[rank.min(samples.len() - 1)]
}

/// p50/p90/p99 of one series, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PercentileRow {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl PercentileRow {
    pub fn from_samples(samples: &mut [f64]) -> Self {
        Self {
            p50: percentile(samples, 0.50),
            p90: percentile(samples, 0.90),
            p99: percentile(samples, 0.99),
        }
    }
}

/// Percentile table for all four series
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub stage1: PercentileRow,
    pub processing: PercentileRow,
    pub stage2: PercentileRow,
    pub total: PercentileRow,
}

impl LatencySummary {
    pub fn from_series(mut series: LatencySeries) -> Self {
        Self {
            samples: series.len(),
            stage1: PercentileRow::from_samples(&mut series.stage1_us),
            processing: PercentileRow::from_samples(&mut series.processing_us),
            stage2: PercentileRow::from_samples(&mut series.stage2_us),
            total: PercentileRow::from_samples(&mut series.total_us),
        }
    }

    pub fn rows(&self) -> [(&'static str, &PercentileRow); 4] {
        [
            ("Stage1", &self.stage1),
            ("Process", &self.processing),
            ("Stage2", &self.stage2),
            ("Total", &self.total),
        ]
    }
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<8} {:>10} {:>10} {:>10}", "Stage", "p50", "p90", "p99")?;
        for (name, row) in self.rows() {
            writeln!(f, "{:<8} {:>10.3} {:>10.3} {:>10.3}", name, row.p50, row.p90, row.p99)?;
        }
        Ok(())
    }
}
