//! Pipeline message model

/// Message routed producer -> processor -> strategy, copied by value
/// through the rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Message {
    /// Message type in `[0, message_types)`
    pub msg_type: u8,
    /// Producer that created the message
    pub origin_id: u32,
    /// Strictly increasing per origin
    pub sequence: u64,
    /// Monotonic nanoseconds at creation
    pub created_at: u64,
    /// Processor that handled the message
    pub routed_by: u32,
    /// Monotonic nanoseconds when the processor took it
    pub processed_at: u64,
}

impl Message {
    pub fn new(msg_type: u8, origin_id: u32, sequence: u64, created_at: u64) -> Self {
        Self {
            msg_type,
            origin_id,
            sequence,
            created_at,
            ..Default::default()
        }
    }

    /// Stamp the processor hop
    #[inline]
    pub fn mark_processed(&mut self, processor_id: u32, now: u64) {
        self.routed_by = processor_id;
        self.processed_at = now;
    }

    /// Creation -> processor pickup, in microseconds
    #[inline]
    pub fn stage1_micros(&self) -> f64 {
        micros_between(self.created_at, self.processed_at)
    }

    /// Processor pickup -> `now`, in microseconds
    #[inline]
    pub fn stage2_micros(&self, now: u64) -> f64 {
        micros_between(self.processed_at, now)
    }

    /// Creation -> `now`, in microseconds
    #[inline]
    pub fn total_micros(&self, now: u64) -> f64 {
        micros_between(self.created_at, now)
    }
}

#[inline]
fn micros_between(start: u64, end: u64) -> f64 {
    end.saturating_sub(start) as f64 / 1000.0
}
