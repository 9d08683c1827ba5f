//! Trade-engine event loop
//!
//! Single pinned thread that owns every piece of mutable trading state:
//! order books, features, positions, risk mirrors, and the order table.
//!
//! ```text
//! feed thread ──► MD ring (SPSC) ──► TradeEngine ──► request ring (MPMC) ──► gateway
//!                                        ▲                                     │
//!                                        └────── response ring (MPMC) ◄────────┘
//! ```
//!
//! Each iteration drains up to [`N_MD_DRAIN`] market updates (book, then
//! features, then strategy; trades additionally mark positions and risk),
//! then up to [`N_RESP_DRAIN`] execution reports. The interleaving bound
//! is observable by strategies and is a tuning parameter, not an accident.
//! When neither queue yields work the loop executes one CPU pause hint;
//! it never parks, yields, or locks.
//!
//! The send path allocates an [`OrderRequest`] record from a bounded pool,
//! runs the risk check, registers the order, and moves the pool handle
//! onto the request ring. Every failure point is a counted drop; nothing
//! blocks and nothing unwinds.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::clock::Clock;
use crate::core::errors::ConfigError;
use crate::core::types::{
    ClientId, MarketUpdate, MarketUpdateKind, Nanos, OrderId, OrderRequest, OrderRequestKind,
    OrderResponse, OrderResponseKind, OrderState, Price, Qty, Side, TickerId, MAX_TICKERS,
};
use crate::features::{FeatureEngine, MarketFeatures};
use crate::oms::{OrderManager, Repricing};
use crate::orderbook::OrderBook;
use crate::position::{PositionInfo, PositionKeeper};
use crate::risk::{RiskConfig, RiskManager};
use crate::transport::{MpmcQueue, ObjectPool, PoolHandle, SpscConsumer};

/// Market updates drained per iteration before responses get a turn.
pub const N_MD_DRAIN: usize = 100;

/// Order responses drained per iteration.
pub const N_RESP_DRAIN: usize = 10;

/// Largest batch of repricings forwarded per `move_orders` call.
const MOVE_BATCH: usize = 64;

/// Scratch size for cancel-all sweeps.
const CANCEL_BATCH: usize = 128;

/// Handle to an [`OrderRequest`] in the engine's request pool. The
/// gateway that dequeues it reads the record and returns the handle.
pub type RequestHandle = PoolHandle;

/// Engine assembly parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub num_tickers: usize,
    pub client_id: ClientId,
    /// Limits applied to every ticker; override per ticker afterwards via
    /// [`TradeEngine::set_risk_config`].
    pub risk: RiskConfig,
    pub request_pool_capacity: usize,
    pub request_ring_capacity: usize,
    pub response_ring_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_tickers: 8,
            client_id: 1,
            risk: RiskConfig::default(),
            request_pool_capacity: 1024,
            request_ring_capacity: 1024,
            response_ring_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_tickers == 0 || self.num_tickers > MAX_TICKERS {
            return Err(ConfigError::TooManyTickers(self.num_tickers));
        }
        if self.request_pool_capacity == 0 {
            return Err(ConfigError::BadCapacity {
                what: "request pool",
                got: self.request_pool_capacity,
            });
        }
        for (what, got) in [
            ("request ring", self.request_ring_capacity),
            ("response ring", self.response_ring_capacity),
        ] {
            if !got.is_power_of_two() {
                return Err(ConfigError::BadCapacity { what, got });
            }
        }
        if self.risk.max_order_rate_per_sec == 0 {
            return Err(ConfigError::ZeroOrderRate);
        }
        if self.risk.min_price > self.risk.max_price {
            return Err(ConfigError::EmptyPriceBand {
                min: self.risk.min_price,
                max: self.risk.max_price,
            });
        }
        Ok(())
    }
}

/// Cross-thread progress counters. Writers are the engine thread only;
/// readers may be anywhere, hence relaxed atomics.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub md_processed: AtomicU64,
    pub trades_processed: AtomicU64,
    pub responses_processed: AtomicU64,
    pub orders_sent: AtomicU64,
    pub risk_rejections: AtomicU64,
    pub drops_pool_exhausted: AtomicU64,
    pub drops_ring_full: AtomicU64,
    pub drops_order_table_full: AtomicU64,
    pub md_dropped_unknown_ticker: AtomicU64,
    pub unknown_order_updates: AtomicU64,
    pub last_event_ns: AtomicU64,
}

impl EngineStats {
    #[inline(always)]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Strategy callbacks. Implementations must not allocate or block; they
/// receive the routing context to place, reprice, and cancel orders.
pub trait Strategy {
    fn on_book_update(
        &mut self,
        ticker: TickerId,
        book: &OrderBook,
        features: &MarketFeatures,
        router: &mut OrderRouter,
    );

    fn on_trade(
        &mut self,
        update: &MarketUpdate,
        features: &MarketFeatures,
        router: &mut OrderRouter,
    );

    /// Called after an execution report has been applied to the order
    /// table and accounting.
    fn on_order_update(&mut self, _response: &OrderResponse, _router: &mut OrderRouter) {}

    fn name(&self) -> &'static str;
}

/// The mutable send-path context handed to strategies: order table, risk,
/// accounting, and the outbound request edge.
pub struct OrderRouter {
    oms: OrderManager,
    risk: RiskManager,
    positions: PositionKeeper,
    request_pool: Arc<ObjectPool<OrderRequest>>,
    request_ring: Arc<MpmcQueue<RequestHandle>>,
    stats: Arc<EngineStats>,
    clock: Arc<dyn Clock>,
    client_id: ClientId,
}

impl OrderRouter {
    /// Place a new order: pool slot, risk gate, order registration, ring.
    /// Any failure is a counted drop and returns `None`.
    pub fn send_order(
        &mut self,
        ticker: TickerId,
        side: Side,
        price: Price,
        qty: Qty,
    ) -> Option<OrderId> {
        let now = self.clock.now_ns();

        let Some(mut handle) = self.request_pool.allocate() else {
            EngineStats::bump(&self.stats.drops_pool_exhausted);
            tracing::debug!(ticker, "request pool exhausted, order dropped");
            return None;
        };

        let verdict = self.risk.check_order(ticker, side, price, qty, now);
        if !verdict.passed() {
            self.request_pool.deallocate(handle);
            EngineStats::bump(&self.stats.risk_rejections);
            return None;
        }

        let Some(order) = self.oms.create_order(ticker, side, price, qty, now) else {
            self.request_pool.deallocate(handle);
            EngineStats::bump(&self.stats.drops_order_table_full);
            return None;
        };
        let order_id = order.order_id;

        *self.request_pool.get_mut(&mut handle) = OrderRequest {
            kind: OrderRequestKind::New,
            client_id: self.client_id,
            ticker_id: ticker,
            order_id,
            side,
            price,
            qty,
            ts_ns: now,
        };

        match self.request_ring.enqueue(handle) {
            Ok(()) => {
                EngineStats::bump(&self.stats.orders_sent);
                Some(order_id)
            }
            Err(handle) => {
                // The order never left the process; retire it.
                self.request_pool.deallocate(handle);
                self.oms
                    .on_order_update(order_id, OrderState::Rejected, 0, 0, now);
                EngineStats::bump(&self.stats.drops_ring_full);
                None
            }
        }
    }

    /// Request cancellation of a LIVE order.
    pub fn cancel_order(&mut self, order_id: OrderId) -> bool {
        let now = self.clock.now_ns();
        let Some(order) = self.oms.order(order_id) else {
            return false;
        };
        if order.state != OrderState::Live {
            return false;
        }
        let (ticker, side, price, leaves) = (
            order.ticker_id,
            order.side,
            order.price,
            order.leaves_qty,
        );

        if !self.emit_request(OrderRequestKind::Cancel, ticker, order_id, side, price, leaves, now) {
            return false;
        }
        self.oms.cancel_order(order_id, now)
    }

    /// Request new terms on a LIVE order. `new_qty` must exceed the filled
    /// quantity.
    pub fn modify_order(&mut self, order_id: OrderId, new_price: Price, new_qty: Qty) -> bool {
        let now = self.clock.now_ns();
        let Some(order) = self.oms.order(order_id) else {
            return false;
        };
        if order.state != OrderState::Live || new_qty <= order.filled_qty {
            return false;
        }
        let (ticker, side) = (order.ticker_id, order.side);

        if !self.emit_request(OrderRequestKind::Modify, ticker, order_id, side, new_price, new_qty, now) {
            return false;
        }
        self.oms.modify_order(order_id, new_price, new_qty, now)
    }

    /// Reprice resting orders so buys sit at or below `bid` and sells at
    /// or above `ask`, clipping leaves at `clip`. Returns how many modify
    /// requests reached the ring.
    pub fn move_orders(&mut self, ticker: TickerId, bid: Price, ask: Price, clip: Qty) -> usize {
        let now = self.clock.now_ns();
        let mut batch = [Repricing::default(); MOVE_BATCH];
        let n = self.oms.move_orders(ticker, bid, ask, clip, now, &mut batch);

        let mut sent = 0;
        for r in &batch[..n] {
            if self.emit_request(
                OrderRequestKind::Modify,
                r.ticker_id,
                r.order_id,
                r.side,
                r.price,
                r.qty,
                now,
            ) {
                sent += 1;
            }
        }
        sent
    }

    /// Cancel every LIVE order for `ticker`. Returns how many cancel
    /// requests reached the ring.
    pub fn cancel_all(&mut self, ticker: TickerId) -> usize {
        let now = self.clock.now_ns();
        let mut ids = [0 as OrderId; CANCEL_BATCH];
        let n = self.oms.cancel_all(ticker, now, &mut ids);

        let mut sent = 0;
        for &order_id in &ids[..n] {
            let Some(order) = self.oms.order(order_id) else {
                continue;
            };
            let (side, price, leaves) = (order.side, order.price, order.leaves_qty);
            if self.emit_request(
                OrderRequestKind::Cancel,
                ticker,
                order_id,
                side,
                price,
                leaves,
                now,
            ) {
                sent += 1;
            }
        }
        sent
    }

    /// Allocate, populate, and enqueue one request record. Drops are
    /// counted per cause.
    fn emit_request(
        &mut self,
        kind: OrderRequestKind,
        ticker: TickerId,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
        now: Nanos,
    ) -> bool {
        let Some(mut handle) = self.request_pool.allocate() else {
            EngineStats::bump(&self.stats.drops_pool_exhausted);
            return false;
        };
        *self.request_pool.get_mut(&mut handle) = OrderRequest {
            kind,
            client_id: self.client_id,
            ticker_id: ticker,
            order_id,
            side,
            price,
            qty,
            ts_ns: now,
        };
        match self.request_ring.enqueue(handle) {
            Ok(()) => {
                EngineStats::bump(&self.stats.orders_sent);
                true
            }
            Err(handle) => {
                self.request_pool.deallocate(handle);
                EngineStats::bump(&self.stats.drops_ring_full);
                false
            }
        }
    }

    /// Route one execution report into the order table, accounting, and
    /// risk mirrors.
    fn apply_response(&mut self, resp: &OrderResponse, now: Nanos) {
        let applied = match resp.kind {
            OrderResponseKind::Ack => {
                self.oms
                    .on_order_update(resp.order_id, OrderState::Live, 0, resp.leaves_qty, now)
            }
            OrderResponseKind::Fill => {
                let new_state = if resp.leaves_qty == 0 {
                    OrderState::Filled
                } else {
                    OrderState::Live
                };
                let applied = self.oms.on_order_update(
                    resp.order_id,
                    new_state,
                    resp.qty,
                    resp.leaves_qty,
                    now,
                );
                if applied {
                    self.positions
                        .on_fill(resp.ticker_id, resp.side, resp.qty, resp.price);
                    self.mirror_to_risk(resp.ticker_id);
                }
                applied
            }
            OrderResponseKind::Cancel => {
                self.oms
                    .on_order_update(resp.order_id, OrderState::Canceled, 0, 0, now)
            }
            OrderResponseKind::Reject => {
                self.oms
                    .on_order_update(resp.order_id, OrderState::Rejected, 0, 0, now)
            }
        };

        if !applied {
            EngineStats::bump(&self.stats.unknown_order_updates);
        }
    }

    /// Mark accounting and risk at a fresh trade print.
    fn on_trade_print(&mut self, ticker: TickerId, price: Price) {
        self.positions.update_market_price(ticker, price);
        self.risk.update_market_price(ticker, price);
        self.mirror_to_risk(ticker);
    }

    fn mirror_to_risk(&mut self, ticker: TickerId) {
        if (ticker as usize) < self.positions.num_tickers() {
            let p = *self.positions.position(ticker);
            self.risk.update_position(ticker, p.net_position);
            self.risk.update_pnl(ticker, p.realized_pnl, p.unrealized_pnl);
        }
    }

    // Read-only views for strategies and tests.

    pub fn orders(&self) -> &OrderManager {
        &self.oms
    }

    pub fn positions(&self) -> &PositionKeeper {
        &self.positions
    }

    pub fn position(&self, ticker: TickerId) -> &PositionInfo {
        self.positions.position(ticker)
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    #[inline(always)]
    pub fn now_ns(&self) -> Nanos {
        self.clock.now_ns()
    }
}

/// The core runtime: books, features, router, one strategy, two inbound
/// queues. Runs on a single pinned thread.
pub struct TradeEngine<S: Strategy> {
    books: Box<[OrderBook]>,
    features: FeatureEngine,
    router: OrderRouter,
    strategy: S,
    md_rx: SpscConsumer<MarketUpdate>,
    response_ring: Arc<MpmcQueue<OrderResponse>>,
    running: Arc<AtomicBool>,
    stats: Arc<EngineStats>,
    clock: Arc<dyn Clock>,
}

impl<S: Strategy> TradeEngine<S> {
    /// Assemble the engine around the consumer half of the market-data
    /// ring. The request/response rings and the request pool are created
    /// here; gateways attach through the accessors.
    pub fn new(
        config: EngineConfig,
        strategy: S,
        clock: Arc<dyn Clock>,
        md_rx: SpscConsumer<MarketUpdate>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let stats = Arc::new(EngineStats::default());
        let request_pool = Arc::new(ObjectPool::<OrderRequest>::new(config.request_pool_capacity));
        let request_ring = Arc::new(MpmcQueue::<RequestHandle>::new(config.request_ring_capacity));
        let response_ring =
            Arc::new(MpmcQueue::<OrderResponse>::new(config.response_ring_capacity));

        tracing::info!(
            strategy = strategy.name(),
            tickers = config.num_tickers,
            "assembling trade engine"
        );

        Ok(Self {
            books: (0..config.num_tickers)
                .map(|i| OrderBook::new(i as TickerId))
                .collect(),
            features: FeatureEngine::new(config.num_tickers),
            router: OrderRouter {
                oms: OrderManager::new(config.client_id),
                risk: RiskManager::new(config.num_tickers, config.risk),
                positions: PositionKeeper::new(config.num_tickers),
                request_pool,
                request_ring,
                stats: Arc::clone(&stats),
                clock: Arc::clone(&clock),
                client_id: config.client_id,
            },
            strategy,
            md_rx,
            response_ring,
            running: Arc::new(AtomicBool::new(true)),
            stats,
            clock,
        })
    }

    /// One event-loop iteration: bounded MD drain, then bounded response
    /// drain. Returns whether any event was processed.
    pub fn poll(&mut self) -> bool {
        let mut progress = false;

        for _ in 0..N_MD_DRAIN {
            let Some(update) = self.md_rx.pop() else { break };
            self.apply_market_update(&update);
            progress = true;
        }

        for _ in 0..N_RESP_DRAIN {
            let Some(resp) = self.response_ring.dequeue() else { break };
            self.apply_order_response(&resp);
            progress = true;
        }

        progress
    }

    /// Run until the `running` flag clears. Idle iterations execute one
    /// CPU pause hint; there is no sleep and no kernel yield.
    pub fn run(&mut self) {
        tracing::info!(strategy = self.strategy.name(), "trade engine running");
        loop {
            if !self.poll() {
                std::hint::spin_loop();
            }
            if !self.running.load(Ordering::Acquire) {
                break;
            }
        }
        tracing::info!("trade engine stopped");
    }

    fn apply_market_update(&mut self, update: &MarketUpdate) {
        let ticker = update.ticker_id as usize;
        let Some(book) = self.books.get_mut(ticker) else {
            EngineStats::bump(&self.stats.md_dropped_unknown_ticker);
            tracing::debug!(ticker, "market update for unregistered ticker dropped");
            return;
        };
        let now = self.clock.now_ns();

        match update.kind {
            MarketUpdateKind::Bid => book.update_bid(0, update.price, update.qty, 1),
            MarketUpdateKind::Ask => book.update_ask(0, update.price, update.qty, 1),
            MarketUpdateKind::Trade => {}
        }
        book.set_last_update_ns(update.ts_ns);

        self.features
            .on_book_update(update.ticker_id, &self.books[ticker], now);
        self.strategy.on_book_update(
            update.ticker_id,
            &self.books[ticker],
            self.features.features(update.ticker_id),
            &mut self.router,
        );

        if update.kind == MarketUpdateKind::Trade {
            self.router.on_trade_print(update.ticker_id, update.price);
            self.features
                .on_trade(update.ticker_id, update.price, update.qty, update.side, now);
            self.strategy.on_trade(
                update,
                self.features.features(update.ticker_id),
                &mut self.router,
            );
            EngineStats::bump(&self.stats.trades_processed);
        }

        EngineStats::bump(&self.stats.md_processed);
        self.stats.last_event_ns.store(now, Ordering::Relaxed);
    }

    fn apply_order_response(&mut self, resp: &OrderResponse) {
        let now = self.clock.now_ns();
        self.router.apply_response(resp, now);
        self.strategy.on_order_update(resp, &mut self.router);

        EngineStats::bump(&self.stats.responses_processed);
        self.stats.last_event_ns.store(now, Ordering::Relaxed);
    }

    /// Override the risk limits for one ticker before trading starts.
    pub fn set_risk_config(&mut self, ticker: TickerId, config: RiskConfig) {
        self.router.risk.set_config(ticker, config);
    }

    // Attachment points for adapter threads.

    /// Cooperative shutdown flag; clear it to stop [`TradeEngine::run`].
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Outbound edge: gateways dequeue request handles here.
    pub fn request_ring(&self) -> Arc<MpmcQueue<RequestHandle>> {
        Arc::clone(&self.router.request_ring)
    }

    /// The pool backing request handles; gateways read through it and
    /// return handles to it.
    pub fn request_pool(&self) -> Arc<ObjectPool<OrderRequest>> {
        Arc::clone(&self.router.request_pool)
    }

    /// Inbound edge: gateways enqueue execution reports here.
    pub fn response_ring(&self) -> Arc<MpmcQueue<OrderResponse>> {
        Arc::clone(&self.response_ring)
    }

    // Views for strategies wired out-of-band, tests, and diagnostics.

    pub fn book(&self, ticker: TickerId) -> Option<&OrderBook> {
        self.books.get(ticker as usize)
    }

    pub fn features(&self) -> &FeatureEngine {
        &self.features
    }

    pub fn router(&self) -> &OrderRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut OrderRouter {
        &mut self.router
    }

    pub fn num_tickers(&self) -> usize {
        self.books.len()
    }
}
