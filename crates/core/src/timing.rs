//! Precision timestamping
//!
//! Two clocks live here: a monotonic nanosecond counter for message
//! timestamps and latency math, and a wall-clock `Timestamp` for report
//! headers.

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Monotonic nanoseconds since the first call in this process.
///
/// Never goes backwards, so differences between two readings taken on any
/// threads are valid latencies.
#[inline(always)]
pub fn nanos() -> u64 {
    let anchor = ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_nanos() as u64
}

/// Busy-wait for roughly `duration_nanos`, used to simulate per-message work.
#[inline]
pub fn spin_for(duration_nanos: u64) {
    if duration_nanos == 0 {
        return;
    }
    let deadline = nanos().saturating_add(duration_nanos);
    while nanos() < deadline {
        std::hint::spin_loop();
    }
}

/// Wall-clock instant for report headers; serializes as RFC 3339
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Nanoseconds since the Unix epoch; out-of-range values clamp to the epoch
    pub fn from_nanos(nanos: u64) -> Self {
        let dt = i64::try_from(nanos)
            .map(DateTime::from_timestamp_nanos)
            .unwrap_or_default();
        Self(dt)
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S%.9f UTC"))
    }
}

/// Scope timer: logs how long a named phase took when dropped
pub struct PerfTimer {
    label: String,
    started_at: u64,
}

impl PerfTimer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started_at: nanos(),
        }
    }

    pub fn elapsed_nanos(&self) -> u64 {
        nanos().saturating_sub(self.started_at)
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.elapsed_nanos() / 1_000
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let micros = self.elapsed_micros();
        crate::log_latency!(self.label, micros);
    }
}
