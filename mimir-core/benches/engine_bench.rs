//! Per-event cost of the trade-engine hot path.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mimir_core::engine::{EngineConfig, OrderRouter, Strategy, TradeEngine};
use mimir_core::features::MarketFeatures;
use mimir_core::orderbook::OrderBook;
use mimir_core::{
    spsc_ring, MarketUpdate, MarketUpdateKind, MonotonicClock, Side, TickerId,
};

struct NoopStrategy;

impl Strategy for NoopStrategy {
    fn on_book_update(
        &mut self,
        _ticker: TickerId,
        _book: &OrderBook,
        _features: &MarketFeatures,
        _router: &mut OrderRouter,
    ) {
    }

    fn on_trade(
        &mut self,
        _update: &MarketUpdate,
        _features: &MarketFeatures,
        _router: &mut OrderRouter,
    ) {
    }

    fn name(&self) -> &'static str {
        "Noop"
    }
}

fn bench_md_event(c: &mut Criterion) {
    let clock = Arc::new(MonotonicClock::new());
    let (mut md_tx, md_rx) = spsc_ring::<MarketUpdate>(1024);
    let mut engine =
        TradeEngine::new(EngineConfig::default(), NoopStrategy, clock, md_rx).unwrap();

    let update = MarketUpdate {
        kind: MarketUpdateKind::Bid,
        ticker_id: 0,
        price: 10_000,
        qty: 50,
        side: Side::Buy,
        ts_ns: 1,
    };

    c.bench_function("engine_md_event", |b| {
        b.iter(|| {
            md_tx.push(black_box(update)).unwrap();
            black_box(engine.poll());
        })
    });
}

criterion_group!(benches, bench_md_event);
criterion_main!(benches);
