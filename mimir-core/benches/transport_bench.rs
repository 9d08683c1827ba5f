//! Throughput of the transport fabric primitives.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mimir_core::transport::{spsc_ring, MpmcQueue, ObjectPool};

fn bench_spsc(c: &mut Criterion) {
    let (mut tx, mut rx) = spsc_ring::<u64>(1024);

    c.bench_function("spsc_push_pop", |b| {
        b.iter(|| {
            tx.push(black_box(42)).unwrap();
            black_box(rx.pop().unwrap());
        })
    });

    c.bench_function("spsc_reserve_commit", |b| {
        b.iter(|| {
            *tx.reserve_write().unwrap() = black_box(42);
            tx.commit_write();
            black_box(rx.peek_read().unwrap());
            rx.commit_read();
        })
    });
}

fn bench_mpmc(c: &mut Criterion) {
    let queue = MpmcQueue::<u64>::new(1024);

    c.bench_function("mpmc_enqueue_dequeue", |b| {
        b.iter(|| {
            queue.enqueue(black_box(42)).unwrap();
            black_box(queue.dequeue().unwrap());
        })
    });
}

fn bench_pool(c: &mut Criterion) {
    let pool = ObjectPool::<[u8; 32]>::new(1024);

    c.bench_function("pool_allocate_deallocate", |b| {
        b.iter(|| {
            let handle = pool.allocate().unwrap();
            pool.deallocate(black_box(handle));
        })
    });
}

criterion_group!(benches, bench_spsc, bench_mpmc, bench_pool);
criterion_main!(benches);
