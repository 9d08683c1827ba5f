//! Multi-producer / multi-consumer bounded queue
//!
//! Per-slot sequence numbers arbitrate producers and consumers without a
//! lock: each slot stores the cursor value it is prepared to serve. A
//! producer claims position `p` by CAS on the shared enqueue cursor, fills
//! the slot whose sequence equals `p`, then stores `p + 1`; a consumer
//! mirrors with `p + 1` expected and stores `p + capacity` on release.
//! Successful enqueue order is a total order observed by all consumers.
//!
//! Used for order requests and responses that may cross several threads,
//! for example two venue gateways draining one request queue.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::cache::CacheAligned;

struct Slot<T> {
    /// Generation marker. `pos` means "ready to fill for enqueue at pos";
    /// `pos + 1` means "holds the value enqueued at pos".
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded lock-free FIFO. Any thread may enqueue or dequeue.
pub struct MpmcQueue<T> {
    buf: Box<[Slot<T>]>,
    mask: usize,
    enqueue_pos: CacheAligned<AtomicUsize>,
    dequeue_pos: CacheAligned<AtomicUsize>,
}

// SAFETY: a slot's value is written exactly once per generation by the
// producer that won the CAS and read exactly once by the consumer that
// won the matching CAS; the sequence stores carry the release/acquire
// ordering between them.
unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    /// Allocate a queue of `capacity` slots (non-zero power of two).
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity > 0,
            "queue capacity must be a non-zero power of two, got {capacity}"
        );

        let buf: Box<[Slot<T>]> = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            buf,
            mask: capacity - 1,
            enqueue_pos: CacheAligned::new(AtomicUsize::new(0)),
            dequeue_pos: CacheAligned::new(AtomicUsize::new(0)),
        }
    }

    /// Append `value`. Returns it back when the queue is full. Retries are
    /// bounded to losing a CAS race against another producer.
    pub fn enqueue(&self, value: T) -> Result<(), T> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.buf[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            if diff == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: winning the CAS gives this thread sole
                        // write access to the slot for this generation.
                        unsafe { (*slot.value.get()).write(value) };
                        slot.sequence.store(pos + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(actual) => pos = actual,
                }
            } else if diff < 0 {
                // The slot still holds a value from one lap behind.
                return Err(value);
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Remove the oldest value, or `None` when the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.buf[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos + 1) as isize;

            if diff == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: winning the CAS gives this thread sole
                        // read access; the value was initialized by the
                        // producer that stored sequence = pos + 1.
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.sequence
                            .store(pos + self.mask + 1, Ordering::Release);
                        return Some(value);
                    }
                    Err(actual) => pos = actual,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Approximate occupancy; exact only when no operation is in flight.
    pub fn len(&self) -> usize {
        let enq = self.enqueue_pos.load(Ordering::Relaxed);
        let deq = self.dequeue_pos.load(Ordering::Relaxed);
        enq.saturating_sub(deq)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        // Values still queued were never read; drop them in place.
        while self.dequeue().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_fifo_single_thread() {
        let q = MpmcQueue::new(8);
        for i in 0..8 {
            q.enqueue(i).unwrap();
        }
        assert!(q.enqueue(99).is_err(), "ninth enqueue must report full");

        for i in 0..8 {
            assert_eq!(q.dequeue(), Some(i));
        }
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn test_refill_after_drain() {
        let q = MpmcQueue::new(4);
        for lap in 0..10 {
            for i in 0..4 {
                q.enqueue(lap * 4 + i).unwrap();
            }
            for i in 0..4 {
                assert_eq!(q.dequeue(), Some(lap * 4 + i));
            }
        }
    }

    #[test]
    fn test_full_returns_value_back() {
        let q = MpmcQueue::new(2);
        q.enqueue(1u32).unwrap();
        q.enqueue(2u32).unwrap();
        assert_eq!(q.enqueue(3u32), Err(3u32));
    }

    #[test]
    fn test_drop_releases_queued_values() {
        let q = MpmcQueue::new(4);
        q.enqueue(String::from("a")).unwrap();
        q.enqueue(String::from("b")).unwrap();
        drop(q); // undrained values must be dropped, not leaked
    }

    // No item observed twice, no successfully enqueued item lost, under
    // N producers and M consumers.
    #[test]
    fn test_no_duplication_no_loss_under_contention() {
        const PRODUCERS: u64 = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: u64 = 20_000;

        let q = Arc::new(MpmcQueue::new(256));
        let mut handles = Vec::new();

        for p in 0..PRODUCERS {
            let q = Arc::clone(&q);
            handles.push(std::thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let mut value = p * PER_PRODUCER + i;
                    loop {
                        match q.enqueue(value) {
                            Ok(()) => break,
                            Err(v) => {
                                value = v;
                                std::hint::spin_loop();
                            }
                        }
                    }
                }
            }));
        }

        let mut consumers = Vec::new();
        for _ in 0..CONSUMERS {
            let q = Arc::clone(&q);
            consumers.push(std::thread::spawn(move || {
                let mut seen = Vec::new();
                let mut idle = 0u32;
                loop {
                    match q.dequeue() {
                        Some(v) => {
                            seen.push(v);
                            idle = 0;
                        }
                        None => {
                            idle += 1;
                            if idle > 10_000 {
                                break;
                            }
                            std::hint::spin_loop();
                        }
                    }
                }
                seen
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let mut all = HashSet::new();
        let mut total = 0usize;
        for c in consumers {
            for v in c.join().unwrap() {
                assert!(all.insert(v), "item {v} observed twice");
                total += 1;
            }
        }
        // Consumers only stop after a long idle streak, so by then every
        // enqueued item has been drained.
        assert_eq!(total, (PRODUCERS * PER_PRODUCER) as usize);
    }

    #[test]
    fn test_per_producer_order_preserved() {
        const PER_PRODUCER: u64 = 10_000;
        let q = Arc::new(MpmcQueue::new(64));

        let producers: Vec<_> = (0..2u64)
            .map(|p| {
                let q = Arc::clone(&q);
                std::thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let mut v = (p, i);
                        while let Err(back) = q.enqueue(v) {
                            v = back;
                            std::hint::spin_loop();
                        }
                    }
                })
            })
            .collect();

        let mut last = [None::<u64>; 2];
        let mut drained = 0;
        while drained < 2 * PER_PRODUCER {
            if let Some((p, i)) = q.dequeue() {
                if let Some(prev) = last[p as usize] {
                    assert!(i > prev, "producer {p} order violated: {i} after {prev}");
                }
                last[p as usize] = Some(i);
                drained += 1;
            } else {
                std::hint::spin_loop();
            }
        }

        for h in producers {
            h.join().unwrap();
        }
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_rejects_non_power_of_two() {
        let _ = MpmcQueue::<u8>::new(6);
    }
}
