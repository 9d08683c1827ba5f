//! Intra-process transport fabric
//!
//! Fixed-capacity, cache-line-isolated building blocks that move records
//! between the feed, engine, and gateway threads without allocating or
//! blocking after warm-up:
//!
//! - [`CacheAligned`]: cache-line isolation wrapper
//! - [`ObjectPool`]: bounded allocator handing out [`PoolHandle`]s
//! - [`spsc_ring`]: single-producer/single-consumer ring, zero-copy API
//! - [`MpmcQueue`]: multi-producer/multi-consumer sequence-indexed queue

pub mod cache;
pub mod mpmc;
pub mod pool;
pub mod spsc;

pub use cache::{CacheAligned, CACHE_LINE_BYTES};
pub use mpmc::MpmcQueue;
pub use pool::{ObjectPool, PoolHandle};
pub use spsc::{spsc_ring, SpscConsumer, SpscProducer};
