//! State shared by every runner
//!
//! Besides the rings, the stop signal and the throughput counters are the
//! only state all stages touch. They live in one [`SharedState`] handed to
//! each runner behind an `Arc`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

use crate::ring::CachePadded;

/// Global stop flag.
///
/// Runners poll it with relaxed loads; nothing else is published through it.
#[derive(Debug, Default)]
pub struct StopSignal(AtomicBool);

impl StopSignal {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    #[inline(always)]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Monotonic throughput counters.
///
/// Each counter is only ever incremented. Increments are release and loads
/// are acquire, so a snapshot that observes a downstream increment also
/// observes the upstream increment that causally preceded it.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    /// Messages a producer committed to a destination
    produced: CachePadded<AtomicU64>,
    /// Messages popped by a processor
    processed: CachePadded<AtomicU64>,
    /// Messages popped and recorded by a strategy
    delivered: CachePadded<AtomicU64>,
    /// Messages given up by a runner when the stop signal cut a retry short
    abandoned: CachePadded<AtomicU64>,
}

impl PipelineCounters {
    #[inline]
    pub fn record_produced(&self) {
        self.produced.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Release);
    }

    /// Read all counters, downstream first, so that
    /// `delivered <= processed <= produced` holds in every snapshot.
    pub fn snapshot(&self) -> CounterSnapshot {
        let delivered = self.delivered.load(Ordering::Acquire);
        let processed = self.processed.load(Ordering::Acquire);
        let produced = self.produced.load(Ordering::Acquire);
        let abandoned = self.abandoned.load(Ordering::Acquire);
        CounterSnapshot {
            produced,
            processed,
            delivered,
            abandoned,
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CounterSnapshot {
    pub produced: u64,
    pub processed: u64,
    pub delivered: u64,
    pub abandoned: u64,
}

/// Everything shared across stages apart from the rings
#[derive(Debug, Default)]
pub struct SharedState {
    pub stop: StopSignal,
    pub counters: PipelineCounters,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }
}
