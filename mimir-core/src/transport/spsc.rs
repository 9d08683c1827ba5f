//! Single-producer / single-consumer bounded ring
//!
//! Capacity is a power of two; indices run free (never wrapped) and are
//! masked only for slot addressing, so the ring is full exactly when
//! `write - read == capacity` and all `capacity` slots are usable.
//!
//! The producer and consumer identities are fixed by construction: the
//! ring is split into two halves at creation and neither half is `Clone`.
//! Each half keeps a locally cached copy of the opposite index and only
//! falls back to an acquire load when the cached view says the ring is
//! full (producer) or empty (consumer). The shared indices live on
//! separate cache lines.
//!
//! The API is zero-copy: `reserve_write` exposes the next slot for
//! in-place construction and `commit_write` publishes it; `peek_read`
//! exposes the oldest slot and `commit_read` releases it. Neither side
//! ever blocks.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::cache::CacheAligned;

struct SpscShared<T> {
    buf: Box<[UnsafeCell<T>]>,
    mask: usize,
    /// Next index the producer will publish. Store-release by producer,
    /// load-acquire by consumer.
    write_idx: CacheAligned<AtomicUsize>,
    /// Next index the consumer will release. Store-release by consumer,
    /// load-acquire by producer.
    read_idx: CacheAligned<AtomicUsize>,
}

// SAFETY: a slot is accessed mutably only by the producer before its index
// is published, and immutably/by-move only by the consumer after; the
// release/acquire pair on write_idx (and read_idx for reuse) orders the
// accesses.
unsafe impl<T: Send> Send for SpscShared<T> {}
unsafe impl<T: Send> Sync for SpscShared<T> {}

/// Create a ring of `capacity` slots (non-zero power of two) and split it
/// into its two endpoints.
pub fn spsc_ring<T: Default>(capacity: usize) -> (SpscProducer<T>, SpscConsumer<T>) {
    assert!(
        capacity.is_power_of_two() && capacity > 0,
        "ring capacity must be a non-zero power of two, got {capacity}"
    );

    let shared = Arc::new(SpscShared {
        buf: (0..capacity).map(|_| UnsafeCell::new(T::default())).collect(),
        mask: capacity - 1,
        write_idx: CacheAligned::new(AtomicUsize::new(0)),
        read_idx: CacheAligned::new(AtomicUsize::new(0)),
    });

    (
        SpscProducer {
            shared: Arc::clone(&shared),
            next_write: 0,
            cached_read: 0,
        },
        SpscConsumer {
            shared,
            next_read: 0,
            cached_write: 0,
        },
    )
}

/// Writing endpoint. Owned by exactly one thread.
pub struct SpscProducer<T> {
    shared: Arc<SpscShared<T>>,
    /// Index of the slot the next commit publishes.
    next_write: usize,
    /// Local view of the consumer's read index.
    cached_read: usize,
}

impl<T> SpscProducer<T> {
    /// Borrow the next free slot for in-place filling, or `None` when the
    /// ring is full. Calling this again before `commit_write` returns the
    /// same slot.
    #[inline(always)]
    pub fn reserve_write(&mut self) -> Option<&mut T> {
        let capacity = self.shared.mask + 1;
        if self.next_write - self.cached_read == capacity {
            self.cached_read = self.shared.read_idx.load(Ordering::Acquire);
            if self.next_write - self.cached_read == capacity {
                return None;
            }
        }
        // SAFETY: this index is unpublished, so the consumer cannot touch
        // it, and there is exactly one producer.
        Some(unsafe { &mut *self.shared.buf[self.next_write & self.shared.mask].get() })
    }

    /// Publish the slot handed out by the last `reserve_write`.
    #[inline(always)]
    pub fn commit_write(&mut self) {
        self.next_write += 1;
        self.shared
            .write_idx
            .store(self.next_write, Ordering::Release);
    }

    /// Reserve, move `value` in, and commit in one call. Returns the value
    /// back when the ring is full.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), T> {
        match self.reserve_write() {
            Some(slot) => {
                *slot = value;
                self.commit_write();
                Ok(())
            }
            None => Err(value),
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }

    /// Committed writes not yet released by the consumer, as visible from
    /// this side.
    #[inline]
    pub fn len(&self) -> usize {
        self.next_write - self.shared.read_idx.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reading endpoint. Owned by exactly one thread.
pub struct SpscConsumer<T> {
    shared: Arc<SpscShared<T>>,
    /// Index of the slot the next commit releases.
    next_read: usize,
    /// Local view of the producer's write index.
    cached_write: usize,
}

impl<T> SpscConsumer<T> {
    /// Borrow the oldest committed slot, or `None` when the ring is empty.
    #[inline(always)]
    pub fn peek_read(&mut self) -> Option<&T> {
        if self.next_read == self.cached_write {
            self.cached_write = self.shared.write_idx.load(Ordering::Acquire);
            if self.next_read == self.cached_write {
                return None;
            }
        }
        // SAFETY: the producer published this index with release ordering
        // and will not rewrite it until read_idx passes it.
        Some(unsafe { &*self.shared.buf[self.next_read & self.shared.mask].get() })
    }

    /// Release the slot handed out by the last `peek_read`. A commit on an
    /// empty ring is a no-op.
    #[inline(always)]
    pub fn commit_read(&mut self) {
        if self.next_read == self.cached_write {
            self.cached_write = self.shared.write_idx.load(Ordering::Acquire);
            if self.next_read == self.cached_write {
                return;
            }
        }
        self.next_read += 1;
        self.shared.read_idx.store(self.next_read, Ordering::Release);
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }

    /// Committed writes not yet released, as visible from this side.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.write_idx.load(Ordering::Acquire) - self.next_read
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Default> SpscConsumer<T> {
    /// Move the oldest committed value out and release its slot.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        if self.next_read == self.cached_write {
            self.cached_write = self.shared.write_idx.load(Ordering::Acquire);
            if self.next_read == self.cached_write {
                return None;
            }
        }
        // SAFETY: same argument as peek_read; the slot is refilled with a
        // default so reuse never observes a moved-from value.
        let value =
            unsafe { std::mem::take(&mut *self.shared.buf[self.next_read & self.shared.mask].get()) };
        self.next_read += 1;
        self.shared.read_idx.store(self.next_read, Ordering::Release);
        Some(value)
    }
}
