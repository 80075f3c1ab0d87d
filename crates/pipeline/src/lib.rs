//! # relaybench pipeline
//!
//! Three-stage message pipeline used to measure inter-thread transit latency
//! and throughput: producers generate typed messages, processors stamp and
//! re-route them, strategies record latencies.
//!
//! ## Architecture
//!
//! - **SPSC rings per edge** - Each producer->processor and processor->strategy
//!   pair owns a bounded lock-free ring with exactly one writer and one reader
//! - **Backpressure, not loss** - A full ring makes the writer retry; messages
//!   are never overwritten
//! - **Type-based routing** - Static tables map message type to processor and
//!   processor output to strategy
//! - **Ordered counters** - Delivered <= processed <= produced in every sample
//! - **Clean shutdown** - Runners are joined in pipeline order and the rings
//!   flushed before the report is written

pub mod errors;
pub mod config;
pub mod ring;
pub mod message;
pub mod routing;
pub mod backoff;
pub mod shared;
pub mod runners;
pub mod latency;
pub mod monitor;
pub mod pipeline;
pub mod report;

// Re-export main types
pub use config::PipelineConfig;
pub use errors::{PipelineError, Result, Stage};
pub use message::Message;
pub use pipeline::{Pipeline, RunOutcome};
pub use report::{run_scenario, RunSummary, Scenario, ScenarioReport};
pub use ring::{channel, RingConsumer, RingProducer, SpscRing};
