//! Lock-free single-producer/single-consumer ring buffer
//!
//! - Fixed capacity, power of two, index wrap by mask
//! - No allocation after construction
//! - One slot always stays empty, so at most `capacity - 1` items are held
//! - Write and read cursors on separate cache lines
//!
//! Each cursor has exactly one writer, so publishing needs nothing more than a
//! release store, and observing the other side needs an acquire load. The
//! producer writes the payload, then release-stores the write cursor; the
//! consumer acquire-loads it before reading the payload. Symmetrically the
//! consumer release-stores the read cursor after moving the payload out, and
//! the producer acquire-loads it before reusing the slot.
//!
//! Single-writer/single-reader is enforced by ownership: [`channel`] hands
//! out one [`RingProducer`] and one [`RingConsumer`], neither of which can be
//! cloned.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Pads and aligns a value to a cache line to avoid false sharing
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CachePadded<T>(pub T);

impl<T> Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Fixed-capacity SPSC ring buffer.
///
/// Push and pop are only reachable through the endpoint handles returned by
/// [`channel`]; the ring itself is shared with monitors for occupancy reads.
pub struct SpscRing<T> {
    /// Next slot the producer writes (producer-owned)
    write: CachePadded<AtomicUsize>,
    /// Next slot the consumer reads (consumer-owned)
    read: CachePadded<AtomicUsize>,
    mask: usize,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: slots in [read, write) are only touched by the consumer and slots
// outside it only by the producer; the cursors hand slots over with
// release/acquire pairs.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Create a ring with `capacity` slots, rounded up to a power of two (minimum 2).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            write: CachePadded(AtomicUsize::new(0)),
            read: CachePadded(AtomicUsize::new(0)),
            mask: capacity - 1,
            slots,
        }
    }

    /// Number of slots in the backing array
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Maximum number of items held at once (one slot is reserved)
    #[inline]
    pub fn usable_capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Instantaneous, possibly stale, count of unread items.
    #[inline]
    pub fn occupancy(&self) -> usize {
        // Read cursor first: it can only trail the write cursor loaded after it.
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        write.wrapping_sub(read) & self.mask
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupancy() == 0
    }

    /// Producer side. Callers must be the single producer.
    #[inline]
    fn push(&self, item: T) -> Result<(), T> {
        let write = self.write.load(Ordering::Relaxed);
        let next = (write + 1) & self.mask;
        if next == self.read.load(Ordering::Acquire) {
            return Err(item); // full
        }

        // SAFETY: `write` is masked into range, and the slot is outside
        // [read, write), so the consumer is not reading it.
        unsafe {
            (*self.slots.get_unchecked(write).get()).write(item);
        }
        self.write.store(next, Ordering::Release);
        Ok(())
    }

    /// Consumer side. Callers must be the single consumer.
    #[inline]
    fn pop(&self) -> Option<T> {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return None; // empty
        }

        // SAFETY: the acquire load above makes the producer's payload write
        // for this slot visible, and the slot stays ours until `read` moves.
        let item = unsafe { (*self.slots.get_unchecked(read).get()).assume_init_read() };
        self.read.store((read + 1) & self.mask, Ordering::Release);
        Some(item)
    }

    /// Drop every unread item and return how many there were.
    ///
    /// Requires exclusive access, i.e. both endpoints are gone.
    pub fn drain_exclusive(&mut self) -> usize {
        let write = *self.write.0.get_mut();
        let mut read = *self.read.0.get_mut();
        let mut drained = 0;

        while read != write {
            // SAFETY: slots in [read, write) hold initialized, unread items.
            unsafe {
                self.slots[read].get_mut().assume_init_drop();
            }
            read = (read + 1) & self.mask;
            drained += 1;
        }

        *self.read.0.get_mut() = read;
        drained
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        self.drain_exclusive();
    }
}

impl<T> std::fmt::Debug for SpscRing<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpscRing")
            .field("capacity", &self.capacity())
            .field("occupancy", &self.occupancy())
            .finish()
    }
}

/// Writing endpoint of a ring
pub struct RingProducer<T> {
    ring: Arc<SpscRing<T>>,
}

impl<T> RingProducer<T> {
    /// Copy `item` into the next slot and publish it.
    ///
    /// A full ring hands the item back untouched; that is backpressure, not
    /// an error.
    #[inline]
    pub fn try_push(&mut self, item: T) -> Result<(), T> {
        self.ring.push(item)
    }

    pub fn ring(&self) -> &Arc<SpscRing<T>> {
        &self.ring
    }
}

/// Reading endpoint of a ring
pub struct RingConsumer<T> {
    ring: Arc<SpscRing<T>>,
}

impl<T> RingConsumer<T> {
    /// Remove and return the oldest unread item, if any.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        self.ring.pop()
    }

    pub fn ring(&self) -> &Arc<SpscRing<T>> {
        &self.ring
    }
}

/// Create a ring of `capacity` slots and split it into its two endpoints.
pub fn channel<T>(capacity: usize) -> (RingProducer<T>, RingConsumer<T>) {
    let ring = Arc::new(SpscRing::with_capacity(capacity));
    (
        RingProducer { ring: Arc::clone(&ring) },
        RingConsumer { ring },
    )
}
