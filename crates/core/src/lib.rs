//! # relaybench core
//!
//! Runtime support shared by the relaybench pipeline.
//!
//! ## Architecture Principles
//!
//! 1. **Thread per runner** - Every pipeline stage runner gets its own named OS thread
//! 2. **CPU binding** - Optional dedicated cores for runner threads
//! 3. **Monotonic nanosecond timing** - Message timestamps never go backwards
//! 4. **Unified logging** - tracing everywhere, ftlog as an optional backend
//! 5. **Run identifiers** - nanoid tags every run's report

pub mod runtime;
pub mod timing;
pub mod logging;
pub mod id_gen;
pub mod cpu;

// Re-export commonly used items
pub use runtime::{spawn_runner, RunnerConfig};
pub use timing::{nanos, spin_for, PerfTimer, Timestamp};
pub use logging::{init_logging, init_logging_with};
pub use id_gen::RunId;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::runtime::{spawn_runner, RunnerConfig};
    pub use crate::timing::{nanos, spin_for, PerfTimer, Timestamp};
    pub use crate::id_gen::RunId;
    pub use crate::logging::init_logging;
    pub use crate::cpu::{bind_to_cpu_set, get_cpu_count};

    // Common external types
    pub use serde::{Deserialize, Serialize};
    pub use chrono::{DateTime, Utc};
}
