//! Simulated end-to-end trading session
//!
//! Wires the full thread roster around the core with in-process stand-ins
//! for the venue adapters:
//!
//! - a feed thread producing a random-walk market on the MD ring;
//! - an echo gateway thread that acknowledges and fills order requests,
//!   returning request handles to the pool;
//! - the trade-engine thread, optionally pinned, running a reference
//!   strategy until ctrl-C or the configured duration elapses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mimir_bins::common::{
    init_logging, print_stats, setup_performance, CommonArgs, StrategyKind,
};
use mimir_core::engine::{RequestHandle, Strategy, TradeEngine};
use mimir_core::transport::{MpmcQueue, ObjectPool, SpscProducer};
use mimir_core::{
    spsc_ring, MarketUpdate, MarketUpdateKind, MonotonicClock, OrderRequest, OrderRequestKind,
    OrderResponse, OrderResponseKind, Side,
};
use mimir_strategies::{LiquidityTaker, LiquidityTakerConfig, MarketMaker, MarketMakerConfig};

const MD_RING_CAPACITY: usize = 4096;

fn main() -> Result<()> {
    let args = CommonArgs::parse();
    init_logging(&args);

    tracing::info!("=== Mimir: simulated trading session ===");
    tracing::info!(
        tickers = args.tickers,
        duration_secs = args.duration_secs,
        seed = args.seed,
        "configuration"
    );

    let config = args.engine_config()?;
    let clock = Arc::new(MonotonicClock::new());
    let (md_tx, md_rx) = spsc_ring::<MarketUpdate>(MD_RING_CAPACITY);

    match args.strategy {
        StrategyKind::MarketMaker => {
            let strategy = MarketMaker::new(MarketMakerConfig::default());
            let engine = TradeEngine::new(config, strategy, clock, md_rx)?;
            run_session(engine, md_tx, &args)
        }
        StrategyKind::LiquidityTaker => {
            let strategy =
                LiquidityTaker::new(LiquidityTakerConfig::default(), config.num_tickers);
            let engine = TradeEngine::new(config, strategy, clock, md_rx)?;
            run_session(engine, md_tx, &args)
        }
    }
}

fn run_session<S: Strategy>(
    mut engine: TradeEngine<S>,
    md_tx: SpscProducer<MarketUpdate>,
    args: &CommonArgs,
) -> Result<()> {
    let running = engine.running();

    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            tracing::warn!("ctrl-c received, shutting down");
            running.store(false, Ordering::Release);
        })?;
    }

    let feed = spawn_feed(
        md_tx,
        Arc::clone(&running),
        args.tickers,
        args.seed,
        Duration::from_secs(args.duration_secs),
    );
    let gateway = spawn_gateway(
        engine.request_ring(),
        engine.request_pool(),
        engine.response_ring(),
        Arc::clone(&running),
        args.seed ^ 0x9e37_79b9,
    );

    setup_performance(args)?;
    engine.run();

    feed.join().expect("feed thread panicked");
    gateway.join().expect("gateway thread panicked");

    print_stats(&engine);
    Ok(())
}

/// Random-walk feed: one mid per ticker, top-of-book refresh plus an
/// occasional trade print.
fn spawn_feed(
    mut md_tx: SpscProducer<MarketUpdate>,
    running: Arc<AtomicBool>,
    tickers: usize,
    seed: u64,
    duration: Duration,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("mimir-feed".into())
        .spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut mids: Vec<i64> = (0..tickers).map(|i| 100_000 + i as i64 * 1_000).collect();
            let started = std::time::Instant::now();

            while running.load(Ordering::Acquire) {
                if started.elapsed() >= duration {
                    tracing::info!("feed duration elapsed, requesting shutdown");
                    running.store(false, Ordering::Release);
                    break;
                }

                let ticker = rng.gen_range(0..tickers) as u32;
                let mid = &mut mids[ticker as usize];
                *mid = (*mid + rng.gen_range(-4..=4)).max(100);
                let half_spread = rng.gen_range(1..=5);
                let ts_ns = started.elapsed().as_nanos() as u64;

                let updates = [
                    MarketUpdate {
                        kind: MarketUpdateKind::Bid,
                        ticker_id: ticker,
                        price: *mid - half_spread,
                        qty: rng.gen_range(10..200),
                        side: Side::Buy,
                        ts_ns,
                    },
                    MarketUpdate {
                        kind: MarketUpdateKind::Ask,
                        ticker_id: ticker,
                        price: *mid + half_spread,
                        qty: rng.gen_range(10..200),
                        side: Side::Sell,
                        ts_ns,
                    },
                ];
                for update in updates {
                    if md_tx.push(update).is_err() {
                        // Engine is behind; drop the refresh and move on.
                        break;
                    }
                }

                if rng.gen_bool(0.3) {
                    let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
                    let price = match side {
                        Side::Buy => *mid + half_spread,
                        Side::Sell => *mid - half_spread,
                    };
                    let _ = md_tx.push(MarketUpdate {
                        kind: MarketUpdateKind::Trade,
                        ticker_id: ticker,
                        price,
                        qty: rng.gen_range(1..50),
                        side,
                        ts_ns,
                    });
                }

                // Feed pacing happens off the hot path; the adapter thread
                // may sleep.
                std::thread::sleep(Duration::from_micros(200));
            }
        })
        .expect("spawn feed thread")
}

/// Echo gateway: acknowledges every request and fills new orders at their
/// limit price, sometimes in two chunks.
fn spawn_gateway(
    request_ring: Arc<MpmcQueue<RequestHandle>>,
    request_pool: Arc<ObjectPool<OrderRequest>>,
    response_ring: Arc<MpmcQueue<OrderResponse>>,
    running: Arc<AtomicBool>,
    seed: u64,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("mimir-gateway".into())
        .spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let send = |resp: OrderResponse| {
                if response_ring.enqueue(resp).is_err() {
                    tracing::warn!(order_id = resp.order_id, "response ring full, report lost");
                }
            };

            loop {
                let Some(handle) = request_ring.dequeue() else {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    std::thread::sleep(Duration::from_micros(50));
                    continue;
                };

                let request = *request_pool.get(&handle);
                request_pool.deallocate(handle);

                let base = OrderResponse {
                    kind: OrderResponseKind::Ack,
                    client_id: request.client_id,
                    ticker_id: request.ticker_id,
                    order_id: request.order_id,
                    side: request.side,
                    price: request.price,
                    qty: 0,
                    leaves_qty: request.qty,
                    ts_ns: request.ts_ns,
                };

                match request.kind {
                    OrderRequestKind::New | OrderRequestKind::Modify => {
                        send(base);

                        if request.kind == OrderRequestKind::New && rng.gen_bool(0.8) {
                            if request.qty > 1 && rng.gen_bool(0.3) {
                                let first = request.qty / 2;
                                send(OrderResponse {
                                    kind: OrderResponseKind::Fill,
                                    qty: first,
                                    leaves_qty: request.qty - first,
                                    ..base
                                });
                                send(OrderResponse {
                                    kind: OrderResponseKind::Fill,
                                    qty: request.qty - first,
                                    leaves_qty: 0,
                                    ..base
                                });
                            } else {
                                send(OrderResponse {
                                    kind: OrderResponseKind::Fill,
                                    qty: request.qty,
                                    leaves_qty: 0,
                                    ..base
                                });
                            }
                        }
                    }
                    OrderRequestKind::Cancel => {
                        send(OrderResponse {
                            kind: OrderResponseKind::Cancel,
                            qty: 0,
                            leaves_qty: 0,
                            ..base
                        });
                    }
                }
            }
        })
        .expect("spawn gateway thread")
}
