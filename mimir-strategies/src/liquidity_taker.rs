//! Liquidity-taking strategy
//!
//! Watches the tape: a rolling window of trade volume per aggressor side.
//! When one side dominates past a configured share and the cooldown has
//! elapsed, it fires a marketable limit order in the direction of the
//! flow, priced through the last print so it crosses immediately.

use mimir_core::engine::{OrderRouter, Strategy};
use mimir_core::features::MarketFeatures;
use mimir_core::orderbook::OrderBook;
use mimir_core::{MarketUpdate, Price, Qty, Side, TickerId};
use serde::{Deserialize, Serialize};

/// Trades remembered per ticker.
pub const TAKER_WINDOW: usize = 32;

/// Window entries required before the strategy may fire.
const MIN_SAMPLES: usize = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LiquidityTakerConfig {
    /// One-sided share of window volume that triggers an order, in
    /// `(0.5, 1.0]`.
    pub flow_threshold: f64,
    pub cooldown_ns: u64,
    pub order_size: Qty,
    /// How far through the last print the order is priced, in bps.
    pub cross_bps: f64,
}

impl Default for LiquidityTakerConfig {
    fn default() -> Self {
        Self {
            flow_threshold: 0.7,
            cooldown_ns: 500_000_000,
            order_size: 10,
            cross_bps: 5.0,
        }
    }
}

/// Rolling signed-volume window over the last [`TAKER_WINDOW`] prints.
#[derive(Debug, Clone)]
struct FlowWindow {
    sides: [Side; TAKER_WINDOW],
    qtys: [Qty; TAKER_WINDOW],
    pos: usize,
    len: usize,
    buy_volume: u64,
    sell_volume: u64,
}

impl FlowWindow {
    fn new() -> Self {
        Self {
            sides: [Side::Buy; TAKER_WINDOW],
            qtys: [0; TAKER_WINDOW],
            pos: 0,
            len: 0,
            buy_volume: 0,
            sell_volume: 0,
        }
    }

    fn push(&mut self, side: Side, qty: Qty) {
        if self.len == TAKER_WINDOW {
            // Evict the entry this slot currently holds.
            let old_qty = self.qtys[self.pos];
            match self.sides[self.pos] {
                Side::Buy => self.buy_volume -= old_qty,
                Side::Sell => self.sell_volume -= old_qty,
            }
        } else {
            self.len += 1;
        }

        self.sides[self.pos] = side;
        self.qtys[self.pos] = qty;
        match side {
            Side::Buy => self.buy_volume += qty,
            Side::Sell => self.sell_volume += qty,
        }
        self.pos = (self.pos + 1) % TAKER_WINDOW;
    }

    fn buy_share(&self) -> Option<f64> {
        let total = self.buy_volume + self.sell_volume;
        if self.len < MIN_SAMPLES || total == 0 {
            None
        } else {
            Some(self.buy_volume as f64 / total as f64)
        }
    }
}

#[derive(Debug, Clone)]
struct TakerState {
    window: FlowWindow,
    last_fire_ns: Option<u64>,
}

/// Momentum-chasing taker fed by trade prints.
pub struct LiquidityTaker {
    config: LiquidityTakerConfig,
    states: Box<[TakerState]>,
}

impl LiquidityTaker {
    pub fn new(config: LiquidityTakerConfig, num_tickers: usize) -> Self {
        Self {
            config,
            states: (0..num_tickers)
                .map(|_| TakerState {
                    window: FlowWindow::new(),
                    last_fire_ns: None,
                })
                .collect(),
        }
    }

    /// Marketable price through the last print in the firing direction.
    #[inline(always)]
    fn cross_price(&self, last: Price, side: Side) -> Price {
        let offset = (last as f64 * self.config.cross_bps / 10_000.0).ceil() as Price;
        match side {
            Side::Buy => last + offset,
            Side::Sell => (last - offset).max(1),
        }
    }
}

impl Strategy for LiquidityTaker {
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
        update: &MarketUpdate,
        _features: &MarketFeatures,
        router: &mut OrderRouter,
    ) {
        let (now, side, buy_share) = {
            let Some(state) = self.states.get_mut(update.ticker_id as usize) else {
                return;
            };
            state.window.push(update.side, update.qty);

            let Some(buy_share) = state.window.buy_share() else {
                return;
            };

            let now = router.now_ns();
            if let Some(last) = state.last_fire_ns {
                if now.saturating_sub(last) < self.config.cooldown_ns {
                    return;
                }
            }

            let side = if buy_share >= self.config.flow_threshold {
                Side::Buy
            } else if 1.0 - buy_share >= self.config.flow_threshold {
                Side::Sell
            } else {
                return;
            };

            (now, side, buy_share)
        };

        let price = self.cross_price(update.price, side);
        if router
            .send_order(update.ticker_id, side, price, self.config.order_size)
            .is_some()
        {
            if let Some(state) = self.states.get_mut(update.ticker_id as usize) {
                state.last_fire_ns = Some(now);
            }
            tracing::debug!(
                ticker = update.ticker_id,
                %side,
                price,
                buy_share,
                "flow imbalance order fired"
            );
        }
    }

    fn name(&self) -> &'static str {
        "LiquidityTaker"
    }
}
