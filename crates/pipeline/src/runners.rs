//! Stage runners
//!
//! Each runner owns its ring endpoints outright and loops on its own thread
//! until the shared stop signal is raised:
//!
//! - [`ProducerRunner`] synthesizes messages and routes them to a processor
//! - [`ProcessorRunner`] stamps them and routes them to a strategy
//! - [`StrategyRunner`] measures their latencies and counts them delivered
//!
//! Waiting is always a poll with a [`Backoff`] between attempts. A message
//! that meets a full ring is retried, never dropped, until it fits or the
//! run is stopped.

use std::sync::Arc;

use rand::distributions::{Distribution, Uniform, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use relaybench_core::timing::{nanos, spin_for};
use tracing::debug;

use crate::backoff::{push_until_stopped, Backoff, WaitStrategy};
use crate::config::ProducerConfig;
use crate::errors::{PipelineError, Result};
use crate::latency::LatencyRecorder;
use crate::message::Message;
use crate::ring::{RingConsumer, RingProducer};
use crate::routing::RoutingTable;
use crate::shared::SharedState;

/// Draws synthetic message types
#[derive(Debug, Clone)]
pub enum TypeSampler {
    Uniform(Uniform<u16>),
    Weighted(WeightedIndex<u32>),
}

impl TypeSampler {
    /// Uniform over `0..message_types` when `weights` is empty, weighted otherwise
    pub fn new(message_types: usize, weights: &[u32]) -> Result<Self> {
        if weights.is_empty() {
            let upper = u16::try_from(message_types)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| PipelineError::InvalidConfig(format!("cannot sample {message_types} message types")))?;
            Ok(Self::Uniform(Uniform::new(0, upper)))
        } else {
            WeightedIndex::new(weights.iter().copied())
                .map(Self::Weighted)
                .map_err(|e| PipelineError::InvalidConfig(format!("producers.type_weights: {e}")))
        }
    }

    #[inline]
    pub fn sample(&self, rng: &mut StdRng) -> u8 {
        match self {
            Self::Uniform(dist) => dist.sample(rng) as u8,
            Self::Weighted(dist) => dist.sample(rng) as u8,
        }
    }
}

/// Seed for producer `origin_id`
pub fn producer_seed(config: &ProducerConfig, origin_id: u32) -> u64 {
    match config.seed {
        Some(seed) => seed.wrapping_add(origin_id as u64),
        None => origin_id as u64 + 1,
    }
}

/// Producer: one outbound ring per processor
pub struct ProducerRunner {
    pub origin_id: u32,
    pub outbound: Vec<RingProducer<Message>>,
    pub routing: Arc<RoutingTable>,
    pub shared: Arc<SharedState>,
    pub sampler: TypeSampler,
    pub rng: StdRng,
    pub wait: WaitStrategy,
}

impl ProducerRunner {
    pub fn new(
        origin_id: u32,
        outbound: Vec<RingProducer<Message>>,
        routing: Arc<RoutingTable>,
        shared: Arc<SharedState>,
        sampler: TypeSampler,
        seed: u64,
        wait: WaitStrategy,
    ) -> Self {
        Self {
            origin_id,
            outbound,
            routing,
            shared,
            sampler,
            rng: StdRng::seed_from_u64(seed),
            wait,
        }
    }

    /// Produce until stopped. Returns the number of sequence numbers issued.
    pub fn run(self) -> u64 {
        let Self {
            origin_id,
            mut outbound,
            routing,
            shared,
            sampler,
            mut rng,
            wait,
        } = self;
        let mut backoff = Backoff::new(wait);
        let mut sequence = 0u64;

        while !shared.stop.is_set() {
            let msg_type = sampler.sample(&mut rng);
            let msg = Message::new(msg_type, origin_id, sequence, nanos());
            sequence += 1;

            let destination = routing.processor_for(msg_type);
            // Counted before publishing so a processor can never count a
            // message the produced counter has not seen yet.
            shared.counters.record_produced();
            if push_until_stopped(&mut outbound[destination], msg, &shared.stop, &mut backoff).is_err() {
                shared.counters.record_abandoned();
                break;
            }
        }

        debug!("producer {} issued {} messages", origin_id, sequence);
        sequence
    }
}

/// Processor: one inbound ring per producer, one outbound ring per strategy
pub struct ProcessorRunner {
    pub id: u32,
    pub inbound: Vec<RingConsumer<Message>>,
    pub outbound: Vec<RingProducer<Message>>,
    pub routing: Arc<RoutingTable>,
    pub shared: Arc<SharedState>,
    pub work_ns: u64,
    pub wait: WaitStrategy,
}

impl ProcessorRunner {
    /// Process until stopped. Returns the number of messages popped.
    pub fn run(self) -> u64 {
        let Self {
            id,
            mut inbound,
            mut outbound,
            routing,
            shared,
            work_ns,
            wait,
        } = self;
        let mut poll = Backoff::new(wait);
        let mut push = Backoff::new(wait);
        let mut handled = 0u64;

        'run: while !shared.stop.is_set() {
            let mut idle = true;
            for rx in inbound.iter_mut() {
                let Some(mut msg) = rx.try_pop() else {
                    continue;
                };
                idle = false;
                handled += 1;
                msg.mark_processed(id, nanos());
                shared.counters.record_processed();
                spin_for(work_ns);

                let destination = routing.strategy_for(msg.msg_type);
                if push_until_stopped(&mut outbound[destination], msg, &shared.stop, &mut push).is_err() {
                    shared.counters.record_abandoned();
                    break 'run;
                }
            }

            if idle {
                poll.snooze();
            } else {
                poll.reset();
            }
        }

        debug!("processor {} handled {} messages", id, handled);
        handled
    }
}

/// Strategy: one inbound ring per processor
pub struct StrategyRunner {
    pub id: u32,
    pub inbound: Vec<RingConsumer<Message>>,
    pub recorder: Arc<LatencyRecorder>,
    pub shared: Arc<SharedState>,
    pub work_ns: u64,
    pub wait: WaitStrategy,
}

impl StrategyRunner {
    /// Consume until stopped. Returns the number of messages delivered.
    pub fn run(self) -> u64 {
        let Self {
            id,
            mut inbound,
            recorder,
            shared,
            work_ns,
            wait,
        } = self;
        let mut poll = Backoff::new(wait);
        let mut delivered = 0u64;

        while !shared.stop.is_set() {
            let mut idle = true;
            for rx in inbound.iter_mut() {
                let Some(msg) = rx.try_pop() else {
                    continue;
                };
                idle = false;

                let now = nanos();
                let stage1 = msg.stage1_micros();
                let stage2 = msg.stage2_micros(now);
                let total = msg.total_micros(now);
                // Processors do no measured work of their own, so the
                // processing series mirrors stage-2 transit.
                let processing = stage2;

                spin_for(work_ns);
                recorder.record(stage1, processing, stage2, total);
                shared.counters.record_delivered();
                delivered += 1;
            }

            if idle {
                poll.snooze();
            } else {
                poll.reset();
            }
        }

        debug!("strategy {} delivered {} messages", id, delivered);
        delivered
    }
}
