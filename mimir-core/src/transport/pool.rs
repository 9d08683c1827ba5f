//! Bounded object pool
//!
//! Pre-allocates a fixed number of maximally aligned slots at construction
//! and never touches the OS allocator again. The free set is a LIFO stack
//! of slot indices guarded by a test-and-set spinlock with exponential
//! backoff; the critical section holds only the stack-top store and the
//! usage counter. Resetting a returned record happens outside the lock and
//! is the caller's job.
//!
//! Ownership discipline: [`PoolHandle`] is a move-only witness for one
//! slot. The pool hands out each index exactly once until it is returned,
//! so holding `&mut PoolHandle` proves exclusive access to the slot and
//! holding `&PoolHandle` proves shared access. That is the entire safety
//! argument for [`ObjectPool::get`] and [`ObjectPool::get_mut`].

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_utils::Backoff;

use super::cache::CacheAligned;

#[cfg(debug_assertions)]
static NEXT_POOL_ID: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(1);

/// Owning reference to one pool slot.
///
/// Not `Clone` and not `Copy`: at most one live handle exists per
/// allocated slot. Dropping a handle without deallocating leaks the slot
/// for the life of the pool (the slot is never handed out again), which is
/// detectable through [`ObjectPool::in_use`].
#[derive(Debug, PartialEq, Eq)]
pub struct PoolHandle {
    index: u32,
    #[cfg(debug_assertions)]
    pool_id: u32,
}

impl PoolHandle {
    /// Slot index inside the owning pool's arena.
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Free stack: indices of unallocated slots, top grows on deallocate.
struct FreeStack {
    indices: Box<[u32]>,
    top: usize,
}

/// Fixed-capacity allocator for one record type.
///
/// `allocate` and `deallocate` are O(1) and never block; `allocate`
/// returns `None` when the pool is empty. The pool may be shared across
/// threads (the producing side allocates, the consuming side returns),
/// which is why the free stack is lock-guarded rather than thread-local.
pub struct ObjectPool<T> {
    slots: Box<[CacheAligned<UnsafeCell<T>>]>,
    free: UnsafeCell<FreeStack>,
    lock: AtomicBool,
    in_use: AtomicUsize,
    #[cfg(debug_assertions)]
    pool_id: u32,
}

// SAFETY: slot payloads are only reached through a PoolHandle, which is
// unique per slot; the free stack is only reached under `lock`.
unsafe impl<T: Send> Send for ObjectPool<T> {}
unsafe impl<T: Send> Sync for ObjectPool<T> {}

impl<T: Default> ObjectPool<T> {
    /// Pre-allocate `capacity` slots. All allocation happens here.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be non-zero");
        assert!(capacity <= u32::MAX as usize, "pool capacity exceeds u32 indexing");

        let slots: Box<[CacheAligned<UnsafeCell<T>>]> = (0..capacity)
            .map(|_| CacheAligned::new(UnsafeCell::new(T::default())))
            .collect();

        // LIFO: slot 0 on top so early allocations stay in warm lines.
        let indices: Box<[u32]> = (0..capacity as u32).rev().collect();

        Self {
            slots,
            free: UnsafeCell::new(FreeStack {
                indices,
                top: capacity,
            }),
            lock: AtomicBool::new(false),
            in_use: AtomicUsize::new(0),
            #[cfg(debug_assertions)]
            pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl<T> ObjectPool<T> {
    #[inline(always)]
    fn acquire_lock(&self) {
        let backoff = Backoff::new();
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff.spin();
        }
    }

    #[inline(always)]
    fn release_lock(&self) {
        self.lock.store(false, Ordering::Release);
    }

    /// Take a free slot. Returns `None` when the pool is exhausted.
    #[inline]
    pub fn allocate(&self) -> Option<PoolHandle> {
        self.acquire_lock();
        // SAFETY: the free stack is only touched while `lock` is held.
        let free = unsafe { &mut *self.free.get() };
        let index = if free.top == 0 {
            None
        } else {
            free.top -= 1;
            Some(free.indices[free.top])
        };
        if index.is_some() {
            self.in_use.fetch_add(1, Ordering::Relaxed);
        }
        self.release_lock();

        index.map(|index| PoolHandle {
            index,
            #[cfg(debug_assertions)]
            pool_id: self.pool_id,
        })
    }

    /// Return a slot to the pool. The payload is left as the caller last
    /// wrote it; reset it before calling this if reuse must see a clean
    /// record.
    #[inline]
    pub fn deallocate(&self, handle: PoolHandle) {
        #[cfg(debug_assertions)]
        {
            assert_eq!(
                handle.pool_id, self.pool_id,
                "handle returned to a pool it does not belong to"
            );
            assert!((handle.index as usize) < self.slots.len());
        }

        self.acquire_lock();
        // SAFETY: the free stack is only touched while `lock` is held; the
        // handle is consumed by value, so this index cannot be pushed twice.
        let free = unsafe { &mut *self.free.get() };
        debug_assert!(free.top < free.indices.len());
        free.indices[free.top] = handle.index;
        free.top += 1;
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        self.release_lock();
    }

    /// Shared access to an allocated slot.
    #[inline(always)]
    pub fn get<'a>(&'a self, handle: &'a PoolHandle) -> &'a T {
        #[cfg(debug_assertions)]
        assert_eq!(handle.pool_id, self.pool_id);
        // SAFETY: `&PoolHandle` proves the slot is allocated; mutation
        // requires `&mut PoolHandle`, which cannot coexist with this borrow.
        unsafe { &*self.slots[handle.index as usize].get() }
    }

    /// Exclusive access to an allocated slot. The returned borrow holds
    /// the handle, so a second exclusive borrow cannot be taken while it
    /// lives.
    #[inline(always)]
    pub fn get_mut<'a>(&'a self, handle: &'a mut PoolHandle) -> &'a mut T {
        #[cfg(debug_assertions)]
        assert_eq!(handle.pool_id, self.pool_id);
        // SAFETY: handles are unique per slot and not Clone, so an
        // exclusive borrow of the handle is an exclusive claim on the slot.
        unsafe { &mut *self.slots[handle.index as usize].get() }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn free(&self) -> usize {
        self.capacity() - self.in_use()
    }

    /// More than 90% of slots allocated.
    pub fn is_near_exhaustion(&self) -> bool {
        self.in_use() * 10 > self.capacity() * 9
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default, Debug, PartialEq)]
    struct Record {
        value: u64,
    }

    #[test]
    fn test_pool_creation() {
        let pool = ObjectPool::<Record>::new(8);
        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.free(), 8);
    }

    #[test]
    fn test_allocate_deallocate_round_trip() {
        let pool = ObjectPool::<Record>::new(4);

        let mut h = pool.allocate().unwrap();
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.free(), 3);

        pool.get_mut(&mut h).value = 42;
        assert_eq!(pool.get(&h).value, 42);

        pool.deallocate(h);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.free(), 4);

        // Repeated back-to-back pairs must not leak.
        for _ in 0..1000 {
            let h = pool.allocate().unwrap();
            pool.deallocate(h);
        }
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.free(), 4);
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let pool = ObjectPool::<Record>::new(2);

        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert!(pool.allocate().is_none());
        assert_eq!(pool.in_use() + pool.free(), pool.capacity());

        pool.deallocate(a);
        assert!(pool.allocate().is_some());
        pool.deallocate(b);
    }

    #[test]
    fn test_conservation_invariant() {
        let pool = ObjectPool::<Record>::new(16);
        let mut held = Vec::new();

        for step in 0..200 {
            if step % 3 == 0 && !held.is_empty() {
                pool.deallocate(held.pop().unwrap());
            } else if let Some(h) = pool.allocate() {
                held.push(h);
            }
            assert_eq!(pool.in_use() + pool.free(), pool.capacity());
            assert_eq!(pool.in_use(), held.len());
        }
    }

    #[test]
    fn test_slot_alignment() {
        let pool = ObjectPool::<Record>::new(3);
        let mut handles: Vec<_> = (0..3).map(|_| pool.allocate().unwrap()).collect();

        let addrs: Vec<usize> = handles
            .iter_mut()
            .map(|h| pool.get(h) as *const Record as usize)
            .collect();
        for addr in &addrs {
            assert_eq!(addr % 64, 0, "slot not on a cache-line boundary");
        }
        for h in handles {
            pool.deallocate(h);
        }
    }

    #[test]
    fn test_near_exhaustion() {
        let pool = ObjectPool::<Record>::new(10);
        let handles: Vec<_> = (0..9).map(|_| pool.allocate().unwrap()).collect();
        assert!(!pool.is_near_exhaustion());

        let tenth = pool.allocate().unwrap();
        assert!(pool.is_near_exhaustion());

        pool.deallocate(tenth);
        for h in handles {
            pool.deallocate(h);
        }
    }

    #[test]
    fn test_cross_thread_allocate_return() {
        let pool = Arc::new(ObjectPool::<Record>::new(64));
        let (tx, rx) = std::sync::mpsc::channel::<PoolHandle>();

        let consumer = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let mut seen = 0u64;
                while let Ok(handle) = rx.recv() {
                    seen += pool.get(&handle).value;
                    pool.deallocate(handle);
                }
                seen
            })
        };

        let mut sent = 0u64;
        for i in 0..10_000u64 {
            let mut h = loop {
                match pool.allocate() {
                    Some(h) => break h,
                    None => std::thread::yield_now(),
                }
            };
            pool.get_mut(&mut h).value = i;
            sent += i;
            tx.send(h).unwrap();
        }
        drop(tx);

        assert_eq!(consumer.join().unwrap(), sent);
        assert_eq!(pool.in_use(), 0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // in_use + free == capacity after any interleaving of
            // allocations and deallocations.
            #[test]
            fn conservation_holds(ops in proptest::collection::vec(any::<bool>(), 1..200)) {
                let pool = ObjectPool::<Record>::new(8);
                let mut held = Vec::new();

                for allocate in ops {
                    if allocate {
                        if let Some(h) = pool.allocate() {
                            held.push(h);
                        }
                    } else if let Some(h) = held.pop() {
                        pool.deallocate(h);
                    }
                    prop_assert_eq!(pool.in_use() + pool.free(), pool.capacity());
                    prop_assert_eq!(pool.in_use(), held.len());
                }
            }
        }
    }
}
