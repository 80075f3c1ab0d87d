//! Retry policy for saturated or empty rings
//!
//! Runners never block on a condition variable. A full destination is retried
//! until it accepts the item or the stop signal is raised, and an empty inbound
//! ring is simply polled again. How a runner waits between attempts is the
//! only thing [`WaitStrategy`] changes; the no-drop guarantee is the same for
//! every policy.

use std::hint;
use std::thread;

use serde::Deserialize;

use crate::ring::RingProducer;
use crate::shared::StopSignal;

/// How a runner waits between failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Yield the thread after every failed attempt
    #[default]
    Yield,
    /// Spin `spins` times with a spin-loop hint, then start yielding
    SpinThenYield { spins: u32 },
    /// Never yield
    BusySpin,
}

/// Per-runner backoff state
#[derive(Debug, Clone)]
pub struct Backoff {
    strategy: WaitStrategy,
    step: u32,
}

impl Backoff {
    pub fn new(strategy: WaitStrategy) -> Self {
        Self { strategy, step: 0 }
    }

    /// Wait once after a failed attempt
    #[inline]
    pub fn snooze(&mut self) {
        match self.strategy {
            WaitStrategy::Yield => thread::yield_now(),
            WaitStrategy::SpinThenYield { spins } => {
                if self.step < spins {
                    self.step += 1;
                    hint::spin_loop();
                } else {
                    thread::yield_now();
                }
            }
            WaitStrategy::BusySpin => hint::spin_loop(),
        }
    }

    /// Start over after a successful attempt
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

/// Push `item`, retrying while the ring is full.
///
/// Returns the item if the stop signal was observed before the ring accepted
/// it; the caller decides how to account for it.
pub fn push_until_stopped<T>(
    tx: &mut RingProducer<T>,
    item: T,
    stop: &StopSignal,
    backoff: &mut Backoff,
) -> Result<(), T> {
    let mut item = item;
    loop {
        match tx.try_push(item) {
            Ok(()) => {
                backoff.reset();
                return Ok(());
            }
            Err(back) => {
                if stop.is_set() {
                    return Err(back);
                }
                item = back;
                backoff.snooze();
            }
        }
    }
}
