//! Pipeline orchestration
//!
//! Build: validate the configuration, build the routing table and wire one
//! ring per producer->processor edge and one per processor->strategy edge, so
//! every ring has exactly one writer and one reader.
//!
//! Run: spawn producers, processors and strategies on their own threads,
//! sample progress for the configured duration, raise the stop signal, join
//! producers -> processors -> strategies, then flush whatever is still queued.

use std::any::Any;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use relaybench_core::cpu::core_for_runner;
use relaybench_core::runtime::{spawn_runner, RunnerConfig};
use relaybench_core::timing::PerfTimer;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result};
use crate::latency::{LatencyRecorder, LatencySummary};
use crate::message::Message;
use crate::monitor::{Monitor, MonitorSample, RingGroup};
use crate::ring::{channel, RingConsumer, RingProducer};
use crate::routing::RoutingTable;
use crate::runners::{producer_seed, ProcessorRunner, ProducerRunner, StrategyRunner, TypeSampler};
use crate::shared::{CounterSnapshot, SharedState};

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Counters after every runner was joined
    pub counters: CounterSnapshot,
    /// Messages still queued between producers and processors at shutdown
    pub residual_stage1: u64,
    /// Messages still queued between processors and strategies at shutdown
    pub residual_stage2: u64,
    /// Occupancy per processor after the shutdown flush
    pub final_stage1_occupancy: Vec<usize>,
    /// Occupancy per strategy after the shutdown flush
    pub final_stage2_occupancy: Vec<usize>,
    pub samples: Vec<MonitorSample>,
    pub latency: LatencySummary,
    pub elapsed_secs: f64,
}

impl RunOutcome {
    /// Every produced message is delivered, still queued, or abandoned at shutdown
    pub fn is_balanced(&self) -> bool {
        let c = &self.counters;
        c.produced == c.delivered + self.residual_stage1 + self.residual_stage2 + c.abandoned
    }

    pub fn residual(&self) -> u64 {
        self.residual_stage1 + self.residual_stage2
    }
}

/// A fully wired, not yet running pipeline
pub struct Pipeline {
    config: PipelineConfig,
    shared: Arc<SharedState>,
    recorder: Arc<LatencyRecorder>,
    producers: Vec<ProducerRunner>,
    processors: Vec<ProcessorRunner>,
    strategies: Vec<StrategyRunner>,
    stage1: Vec<RingGroup>,
    stage2: Vec<RingGroup>,
}

impl Pipeline {
    pub fn build(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let routing = Arc::new(RoutingTable::build(&config)?);
        let shared = Arc::new(SharedState::new());
        let recorder = Arc::new(LatencyRecorder::new());

        let producer_count = config.producers.count;
        let processor_count = config.processors.count;
        let strategy_count = config.strategies.count;
        let capacity = config.queue_capacity;

        // Stage 1: producer p -> processor q
        let mut producer_outbound: Vec<Vec<RingProducer<Message>>> = Vec::with_capacity(producer_count);
        let mut processor_inbound: Vec<Vec<RingConsumer<Message>>> =
            (0..processor_count).map(|_| Vec::with_capacity(producer_count)).collect();
        let mut stage1: Vec<RingGroup> = (0..processor_count).map(|_| Vec::with_capacity(producer_count)).collect();
        for _ in 0..producer_count {
            let mut outbound = Vec::with_capacity(processor_count);
            for q in 0..processor_count {
                let (tx, rx) = channel(capacity);
                stage1[q].push(Arc::clone(tx.ring()));
                processor_inbound[q].push(rx);
                outbound.push(tx);
            }
            producer_outbound.push(outbound);
        }

        // Stage 2: processor q -> strategy s
        let mut processor_outbound: Vec<Vec<RingProducer<Message>>> = Vec::with_capacity(processor_count);
        let mut strategy_inbound: Vec<Vec<RingConsumer<Message>>> =
            (0..strategy_count).map(|_| Vec::with_capacity(processor_count)).collect();
        let mut stage2: Vec<RingGroup> = (0..strategy_count).map(|_| Vec::with_capacity(processor_count)).collect();
        for _ in 0..processor_count {
            let mut outbound = Vec::with_capacity(strategy_count);
            for s in 0..strategy_count {
                let (tx, rx) = channel(capacity);
                stage2[s].push(Arc::clone(tx.ring()));
                strategy_inbound[s].push(rx);
                outbound.push(tx);
            }
            processor_outbound.push(outbound);
        }

        let sampler = TypeSampler::new(config.message_types, &config.producers.type_weights)?;
        let producers = producer_outbound
            .into_iter()
            .enumerate()
            .map(|(p, outbound)| {
                let origin_id = p as u32;
                ProducerRunner::new(
                    origin_id,
                    outbound,
                    Arc::clone(&routing),
                    Arc::clone(&shared),
                    sampler.clone(),
                    producer_seed(&config.producers, origin_id),
                    config.wait,
                )
            })
            .collect();

        let processors = processor_inbound
            .into_iter()
            .zip(processor_outbound)
            .enumerate()
            .map(|(q, (inbound, outbound))| ProcessorRunner {
                id: q as u32,
                inbound,
                outbound,
                routing: Arc::clone(&routing),
                shared: Arc::clone(&shared),
                work_ns: config.processors.work_ns,
                wait: config.wait,
            })
            .collect();

        let strategies = strategy_inbound
            .into_iter()
            .enumerate()
            .map(|(s, inbound)| StrategyRunner {
                id: s as u32,
                inbound,
                recorder: Arc::clone(&recorder),
                shared: Arc::clone(&shared),
                work_ns: config.strategies.work_ns,
                wait: config.wait,
            })
            .collect();

        Ok(Self {
            config,
            shared,
            recorder,
            producers,
            processors,
            strategies,
            stage1,
            stage2,
        })
    }

    /// Run for the configured duration, handing each monitor sample to `sink`.
    pub fn run<F>(self, sink: F) -> Result<RunOutcome>
    where
        F: FnMut(&MonitorSample),
    {
        let Self {
            config,
            shared,
            recorder,
            producers,
            processors,
            strategies,
            stage1,
            stage2,
        } = self;

        info!(
            "🚀 Starting pipeline: {} producers, {} processors, {} strategies, queue capacity {}",
            config.producers.count, config.processors.count, config.strategies.count, config.queue_capacity
        );
        let ticks = config.monitor_ticks();
        let interval = Duration::from_millis(config.monitor_interval_ms);
        let started = Instant::now();

        let runners = RunningRunners::start(
            Arc::clone(&shared),
            producers,
            processors,
            strategies,
            config.cpu_binding,
            spawn_task,
        )?;

        let mut monitor = Monitor::new(Arc::clone(&shared), stage1, stage2);
        let samples = monitor.run(ticks, interval, sink);

        let shutdown = PerfTimer::start("pipeline_shutdown");
        runners.stop_and_join()?;
        let counters = shared.counters.snapshot();

        let (residual_stage1, residual_stage2) = monitor.occupancy();
        let residual_stage1 = residual_stage1.iter().sum::<usize>() as u64;
        let residual_stage2 = residual_stage2.iter().sum::<usize>() as u64;
        let flushed = monitor.flush();
        let (final_stage1_occupancy, final_stage2_occupancy) = monitor.occupancy();
        drop(shutdown);

        info!(
            "✅ Pipeline finished: produced {} | processed {} | delivered {} | abandoned {} | flushed {}",
            counters.produced, counters.processed, counters.delivered, counters.abandoned, flushed
        );

        let latency = LatencySummary::from_series(recorder.take());
        Ok(RunOutcome {
            counters,
            residual_stage1,
            residual_stage2,
            final_stage1_occupancy,
            final_stage2_occupancy,
            samples,
            latency,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}

/// Body of one runner thread; returns the number of messages it handled
type RunnerTask = Box<dyn FnOnce() -> u64 + Send + 'static>;

fn spawn_task(config: RunnerConfig, task: RunnerTask) -> io::Result<JoinHandle<u64>> {
    spawn_runner(config, task)
}

/// Spawned runners of a live pipeline.
///
/// Dropping this without `stop_and_join` (an unwinding sink, say) still
/// raises the stop signal and joins every runner.
struct RunningRunners {
    shared: Arc<SharedState>,
    handles: Option<RunnerHandles>,
}

impl RunningRunners {
    /// Spawn every runner in pipeline order. If a spawn fails, the runners
    /// already started are stopped and joined before the error is returned.
    fn start<S>(
        shared: Arc<SharedState>,
        producers: Vec<ProducerRunner>,
        processors: Vec<ProcessorRunner>,
        strategies: Vec<StrategyRunner>,
        cpu_binding: bool,
        spawn: S,
    ) -> Result<Self>
    where
        S: FnMut(RunnerConfig, RunnerTask) -> io::Result<JoinHandle<u64>>,
    {
        let mut handles = RunnerHandles::default();
        let spawned = handles.spawn_all(producers, processors, strategies, cpu_binding, spawn);
        let running = Self {
            shared,
            handles: Some(handles),
        };

        match spawned {
            Ok(()) => Ok(running),
            Err(e) => {
                error!("❌ Runner spawn failed, stopping the {} runners already started", running.len());
                // The spawn error is what gets reported; panics during teardown are only logged.
                if let Err(join_err) = running.stop_and_join() {
                    warn!("{}", join_err);
                }
                Err(e)
            }
        }
    }

    fn len(&self) -> usize {
        self.handles.as_ref().map_or(0, RunnerHandles::len)
    }

    /// Raise the stop signal and join producers -> processors -> strategies
    fn stop_and_join(mut self) -> Result<()> {
        self.shared.stop.trigger();
        info!("⏹️  Stop signal raised, joining runners");
        match self.handles.take() {
            Some(handles) => handles.join_all(),
            None => Ok(()),
        }
    }
}

impl Drop for RunningRunners {
    fn drop(&mut self) {
        if let Some(handles) = self.handles.take() {
            warn!("Pipeline aborted, stopping {} runners", handles.len());
            self.shared.stop.trigger();
            if let Err(e) = handles.join_all() {
                warn!("{}", e);
            }
        }
    }
}

#[derive(Default)]
struct RunnerHandles {
    producers: Vec<JoinHandle<u64>>,
    processors: Vec<JoinHandle<u64>>,
    strategies: Vec<JoinHandle<u64>>,
}

impl RunnerHandles {
    /// Spawn every runner in pipeline order. Stops at the first failure,
    /// leaving the already spawned handles in `self`.
    fn spawn_all<S>(
        &mut self,
        producers: Vec<ProducerRunner>,
        processors: Vec<ProcessorRunner>,
        strategies: Vec<StrategyRunner>,
        cpu_binding: bool,
        mut spawn: S,
    ) -> Result<()>
    where
        S: FnMut(RunnerConfig, RunnerTask) -> io::Result<JoinHandle<u64>>,
    {
        let mut spawned = 0usize;
        let mut runner_config = |name: String| {
            let core = cpu_binding.then(|| core_for_runner(spawned));
            spawned += 1;
            RunnerConfig::named(name).with_cpu_core(core)
        };

        for runner in producers {
            let config = runner_config(format!("producer-{}", runner.origin_id));
            let handle = spawn(config, Box::new(move || runner.run())).map_err(PipelineError::Spawn)?;
            self.producers.push(handle);
        }
        for runner in processors {
            let config = runner_config(format!("processor-{}", runner.id));
            let handle = spawn(config, Box::new(move || runner.run())).map_err(PipelineError::Spawn)?;
            self.processors.push(handle);
        }
        for runner in strategies {
            let config = runner_config(format!("strategy-{}", runner.id));
            let handle = spawn(config, Box::new(move || runner.run())).map_err(PipelineError::Spawn)?;
            self.strategies.push(handle);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.producers.len() + self.processors.len() + self.strategies.len()
    }

    /// Join producers, then processors, then strategies. Every runner is
    /// joined even if one panicked; the first panic is reported.
    fn join_all(self) -> Result<()> {
        let mut first_panic = None;
        let groups = [
            ("producer", self.producers),
            ("processor", self.processors),
            ("strategy", self.strategies),
        ];
        for (role, group) in groups {
            for (id, handle) in group.into_iter().enumerate() {
                if let Err(payload) = handle.join() {
                    let message = format!("{role}-{id}: {}", panic_message(&*payload));
                    error!("❌ Runner panicked: {}", message);
                    first_panic.get_or_insert(message);
                }
            }
        }

        match first_panic {
            Some(message) => Err(PipelineError::RunnerPanicked(message)),
            None => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
