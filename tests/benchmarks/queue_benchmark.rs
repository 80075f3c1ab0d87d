//! Queue benchmark for relaybench
//!
//! Compares the pipeline's `SpscRing` against the `ringbuf` crate's `HeapRb`:
//! - Sustained single-producer/single-consumer throughput
//! - Round-trip latency through a pair of rings

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use relaybench_core::cpu::core_for_runner;
use relaybench_core::prelude::*;
use relaybench_pipeline::message::Message;
use relaybench_pipeline::ring::channel;
use ringbuf::HeapRb;
use tracing::info;

const QUEUE_SIZE: usize = 1 << 16;
const MEASURE_WINDOW: Duration = Duration::from_millis(500);
const THROUGHPUT_ITERATIONS: usize = 5;
const ROUND_TRIPS: usize = 100_000;

/// Round-trip latency statistics
#[derive(Debug, Clone)]
pub struct BenchmarkStats {
    pub name: String,
    pub iterations: u64,
    pub avg_time_nanos: u64,
    pub min_time_nanos: u64,
    pub max_time_nanos: u64,
    pub p50_nanos: u64,
    pub p95_nanos: u64,
    pub p99_nanos: u64,
}

impl BenchmarkStats {
    pub fn from_samples(name: String, mut samples: Vec<u64>) -> Self {
        if samples.is_empty() {
            return Self {
                name,
                iterations: 0,
                avg_time_nanos: 0,
                min_time_nanos: 0,
                max_time_nanos: 0,
                p50_nanos: 0,
                p95_nanos: 0,
                p99_nanos: 0,
            };
        }

        samples.sort_unstable();
        let len = samples.len();
        let total: u64 = samples.iter().sum();

        Self {
            name,
            iterations: len as u64,
            avg_time_nanos: total / len as u64,
            min_time_nanos: samples[0],
            max_time_nanos: samples[len - 1],
            p50_nanos: samples[len / 2],
            p95_nanos: samples[(len * 95) / 100],
            p99_nanos: samples[(len * 99) / 100],
        }
    }

    pub fn print_summary(&self) {
        info!("📊 Benchmark: {}", self.name);
        info!("   Round trips: {}", self.iterations);
        info!("   Avg: {}ns  Min: {}ns  Max: {}ns", self.avg_time_nanos, self.min_time_nanos, self.max_time_nanos);
        info!("   P50: {}ns  P95: {}ns  P99: {}ns", self.p50_nanos, self.p95_nanos, self.p99_nanos);
    }
}

/// Sustained throughput over repeated fixed windows
#[derive(Debug, Clone)]
pub struct ThroughputStats {
    pub name: String,
    pub messages_per_sec: Vec<f64>,
}

impl ThroughputStats {
    pub fn mean(&self) -> f64 {
        if self.messages_per_sec.is_empty() {
            return 0.0;
        }
        self.messages_per_sec.iter().sum::<f64>() / self.messages_per_sec.len() as f64
    }

    pub fn best(&self) -> f64 {
        self.messages_per_sec.iter().copied().fold(0.0, f64::max)
    }

    pub fn print_summary(&self) {
        info!("📊 Benchmark: {}", self.name);
        info!("   Windows: {} x {}ms", self.messages_per_sec.len(), MEASURE_WINDOW.as_millis());
        info!("   Mean: {:.2}M msg/s  Best: {:.2}M msg/s", self.mean() / 1e6, self.best() / 1e6);
    }
}

fn spawn_pinned<F, T>(name: &str, index: usize, f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let config = RunnerConfig::named(name).with_cpu_core(Some(core_for_runner(index)));
    match spawn_runner(config, f) {
        Ok(handle) => handle,
        Err(e) => panic!("failed to spawn {name}: {e}"),
    }
}

/// One measurement window: the producer pushes as fast as the consumer
/// allows, the consumer counts what it pops.
fn throughput_window<P, C>(
    mut tx: P,
    mut rx: C,
    push: fn(&mut P, Message) -> Result<(), Message>,
    pop: fn(&mut C) -> Option<Message>,
) -> f64
where
    P: Send + 'static,
    C: Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let popped = Arc::new(AtomicU64::new(0));

    let producer_stop = Arc::clone(&stop);
    let producer = spawn_pinned("bench-producer", 0, move || {
        let mut sequence = 0u64;
        while !producer_stop.load(Ordering::Relaxed) {
            let msg = Message::new((sequence & 3) as u8, 0, sequence, 0);
            if push(&mut tx, msg).is_ok() {
                sequence += 1;
            } else {
                thread::yield_now();
            }
        }
    });

    let consumer_stop = Arc::clone(&stop);
    let consumer_count = Arc::clone(&popped);
    let consumer = spawn_pinned("bench-consumer", 1, move || {
        let mut count = 0u64;
        while !consumer_stop.load(Ordering::Relaxed) {
            if pop(&mut rx).is_some() {
                count += 1;
            } else {
                thread::yield_now();
            }
        }
        consumer_count.store(count, Ordering::Relaxed);
    });

    let start = Instant::now();
    thread::sleep(MEASURE_WINDOW);
    stop.store(true, Ordering::Release);
    let elapsed = start.elapsed();

    let _ = producer.join();
    let _ = consumer.join();
    popped.load(Ordering::Relaxed) as f64 / elapsed.as_secs_f64()
}

/// Send a stamped message through `ping` and time its return through `pong`
fn round_trips<P, C>(
    (mut ping_tx, mut ping_rx): (P, C),
    (mut pong_tx, mut pong_rx): (P, C),
    push: fn(&mut P, Message) -> Result<(), Message>,
    pop: fn(&mut C) -> Option<Message>,
) -> Vec<u64>
where
    P: Send + 'static,
    C: Send + 'static,
{
    let echo = spawn_pinned("bench-echo", 1, move || {
        for _ in 0..ROUND_TRIPS {
            let msg = loop {
                if let Some(msg) = pop(&mut ping_rx) {
                    break msg;
                }
                std::hint::spin_loop();
            };
            let mut pending = msg;
            while let Err(back) = push(&mut pong_tx, pending) {
                pending = back;
                std::hint::spin_loop();
            }
        }
    });

    let mut samples = Vec::with_capacity(ROUND_TRIPS);
    for sequence in 0..ROUND_TRIPS as u64 {
        let sent = nanos();
        let mut pending = Message::new(0, 0, sequence, sent);
        while let Err(back) = push(&mut ping_tx, pending) {
            pending = back;
            std::hint::spin_loop();
        }
        loop {
            if let Some(msg) = pop(&mut pong_rx) {
                debug_assert_eq!(msg.sequence, sequence);
                samples.push(nanos() - msg.created_at);
                break;
            }
            std::hint::spin_loop();
        }
    }

    let _ = echo.join();
    samples
}

fn spsc_pair() -> (
    relaybench_pipeline::ring::RingProducer<Message>,
    relaybench_pipeline::ring::RingConsumer<Message>,
) {
    channel(QUEUE_SIZE)
}

fn heap_rb_pair() -> (ringbuf::HeapProducer<Message>, ringbuf::HeapConsumer<Message>) {
    HeapRb::<Message>::new(QUEUE_SIZE).split()
}

/// Queue comparison suite
pub struct QueueBenchmark {
    throughput: Vec<ThroughputStats>,
    latency: Vec<BenchmarkStats>,
}

impl QueueBenchmark {
    pub fn new() -> Self {
        Self {
            throughput: Vec::new(),
            latency: Vec::new(),
        }
    }

    pub fn run_all(&mut self) {
        info!("🚀 Starting queue benchmark suite ({} slots per queue)", QUEUE_SIZE);

        self.benchmark_throughput();
        self.benchmark_round_trip();
        self.print_summary();
    }

    fn benchmark_throughput(&mut self) {
        info!("📦 Benchmarking SPSC throughput...");

        let spsc = (0..THROUGHPUT_ITERATIONS)
            .map(|_| {
                let (tx, rx) = spsc_pair();
                throughput_window(tx, rx, |tx, msg| tx.try_push(msg), |rx| rx.try_pop())
            })
            .collect();
        let stats = ThroughputStats {
            name: "SpscRing Throughput".to_string(),
            messages_per_sec: spsc,
        };
        stats.print_summary();
        self.throughput.push(stats);

        let heap = (0..THROUGHPUT_ITERATIONS)
            .map(|_| {
                let (tx, rx) = heap_rb_pair();
                throughput_window(tx, rx, |tx, msg| tx.push(msg), |rx| rx.pop())
            })
            .collect();
        let stats = ThroughputStats {
            name: "ringbuf HeapRb Throughput".to_string(),
            messages_per_sec: heap,
        };
        stats.print_summary();
        self.throughput.push(stats);
    }

    fn benchmark_round_trip(&mut self) {
        info!("⏱️  Benchmarking round-trip latency...");

        let samples = round_trips(spsc_pair(), spsc_pair(), |tx, msg| tx.try_push(msg), |rx| rx.try_pop());
        let stats = BenchmarkStats::from_samples("SpscRing Round Trip".to_string(), samples);
        stats.print_summary();
        self.latency.push(stats);

        let samples = round_trips(heap_rb_pair(), heap_rb_pair(), |tx, msg| tx.push(msg), |rx| rx.pop());
        let stats = BenchmarkStats::from_samples("ringbuf HeapRb Round Trip".to_string(), samples);
        stats.print_summary();
        self.latency.push(stats);
    }

    fn print_summary(&self) {
        info!("🎯 Queue benchmark summary");
        for stats in &self.throughput {
            info!("   {:<28} {:>8.2}M msg/s", stats.name, stats.mean() / 1e6);
        }
        for stats in &self.latency {
            info!("   {:<28} {:>8}ns p50 {:>8}ns p99", stats.name, stats.p50_nanos, stats.p99_nanos);
        }
    }
}

fn main() {
    init_logging();

    info!("🎯 relaybench queue benchmark");
    let mut benchmark = QueueBenchmark::new();
    benchmark.run_all();
    info!("✅ Benchmark suite completed");
}
