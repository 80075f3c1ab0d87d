//! Periodic progress sampling
//!
//! Runs on the orchestrating thread. Each sample reads the shared counters,
//! turns them into per-interval deltas and snapshots ring occupancy for both
//! stages.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::message::Message;
use crate::ring::SpscRing;
use crate::shared::{CounterSnapshot, SharedState};

/// One progress sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSample {
    /// Nominal time since the run started
    pub elapsed_secs: f64,
    /// Absolute counters at sampling time
    pub counters: CounterSnapshot,
    pub produced_delta: u64,
    pub processed_delta: u64,
    pub delivered_delta: u64,
    /// Growth of `produced - delivered` over the interval. Approximate: it is
    /// backlog growth, not loss, and may be negative.
    pub lost_delta: i64,
    /// Unread messages per processor, summed over its inbound rings
    pub stage1_occupancy: Vec<usize>,
    /// Unread messages per strategy, summed over its inbound rings
    pub stage2_occupancy: Vec<usize>,
}

impl MonitorSample {
    pub fn total_occupancy(&self) -> usize {
        self.stage1_occupancy.iter().chain(&self.stage2_occupancy).sum()
    }
}

fn millions(count: f64) -> f64 {
    count / 1e6
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[usize]) -> fmt::Result {
    write!(f, "[")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{value}")?;
    }
    write!(f, "]")
}

impl fmt::Display for MonitorSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.2}s] Produced: {:.2}M | Processed: {:.2}M | Delivered: {:.2}M | Lost: {:.2}M | Stage1 Queues: ",
            self.elapsed_secs,
            millions(self.produced_delta as f64),
            millions(self.processed_delta as f64),
            millions(self.delivered_delta as f64),
            millions(self.lost_delta as f64),
        )?;
        write_list(f, &self.stage1_occupancy)?;
        write!(f, " | Stage2 Queues: ")?;
        write_list(f, &self.stage2_occupancy)
    }
}

/// Upper bound on the sample buffer reserved up front; longer runs grow it
const PREALLOCATED_SAMPLES: u64 = 4096;

/// Inbound rings of one destination
pub type RingGroup = Vec<Arc<SpscRing<Message>>>;

/// Counter and occupancy sampler
pub struct Monitor {
    shared: Arc<SharedState>,
    stage1: Vec<RingGroup>,
    stage2: Vec<RingGroup>,
    prev: CounterSnapshot,
}

impl Monitor {
    pub fn new(shared: Arc<SharedState>, stage1: Vec<RingGroup>, stage2: Vec<RingGroup>) -> Self {
        Self {
            shared,
            stage1,
            stage2,
            prev: CounterSnapshot::default(),
        }
    }

    /// Current occupancy per processor and per strategy
    pub fn occupancy(&self) -> (Vec<usize>, Vec<usize>) {
        (group_occupancy(&self.stage1), group_occupancy(&self.stage2))
    }

    /// Take one sample and advance the delta baseline
    pub fn sample(&mut self, elapsed: Duration) -> MonitorSample {
        let now = self.shared.counters.snapshot();
        let prev = self.prev;

        let backlog_now = now.produced as i64 - now.delivered as i64;
        let backlog_prev = prev.produced as i64 - prev.delivered as i64;
        let (stage1_occupancy, stage2_occupancy) = self.occupancy();

        self.prev = now;
        MonitorSample {
            elapsed_secs: elapsed.as_secs_f64(),
            counters: now,
            produced_delta: now.produced - prev.produced,
            processed_delta: now.processed - prev.processed,
            delivered_delta: now.delivered - prev.delivered,
            lost_delta: backlog_now - backlog_prev,
            stage1_occupancy,
            stage2_occupancy,
        }
    }

    /// Sample `ticks` times, one `interval` apart, handing each sample to `sink`.
    ///
    /// Sleeps toward absolute deadlines so slow sinks do not stretch the run.
    pub fn run<F>(&mut self, ticks: u64, interval: Duration, mut sink: F) -> Vec<MonitorSample>
    where
        F: FnMut(&MonitorSample),
    {
        let start = Instant::now();
        let mut samples = Vec::with_capacity(ticks.min(PREALLOCATED_SAMPLES) as usize);

        for tick in 1..=ticks {
            let nominal = interval.saturating_mul(tick.min(u32::MAX as u64) as u32);
            if let Some(remaining) = (start + nominal).checked_duration_since(Instant::now()) {
                thread::sleep(remaining);
            }

            let sample = self.sample(nominal);
            info!("{}", sample);
            sink(&sample);
            samples.push(sample);
        }

        samples
    }

    /// Drain every ring after all runners are joined. Returns the number of
    /// messages discarded.
    pub fn flush(&mut self) -> usize {
        let mut flushed = 0;
        for ring in self.stage1.iter_mut().chain(self.stage2.iter_mut()).flatten() {
            let queued = ring.occupancy();
            match Arc::get_mut(ring) {
                Some(exclusive) => flushed += exclusive.drain_exclusive(),
                // An endpoint outlived its runner; leave the ring alone.
                None => warn!("ring still has a live endpoint, {} messages left queued", queued),
            }
        }
        flushed
    }
}

fn group_occupancy(groups: &[RingGroup]) -> Vec<usize> {
    groups
        .iter()
        .map(|rings| rings.iter().map(|ring| ring.occupancy()).sum())
        .collect()
}
