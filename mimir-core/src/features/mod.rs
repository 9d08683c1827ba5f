//! Microstructure feature derivation
//!
//! Recomputes per-instrument features on every book update and folds
//! trade prints into the volume-weighted accumulators. All emitted values
//! are floats; `NaN` means "not yet computable" and a feature set is valid
//! only once fair price and spread are finite. A crossed book produces no
//! emission for that update.
//!
//! Trade-side accumulators are exact integers (u128 notional, u64 volume)
//! and only become floats at the emission boundary.

use crate::core::types::{Nanos, Price, Qty, Side, TickerId, PRICE_INVALID};
use crate::orderbook::OrderBook;

/// Length of the rolling fair-price window used for momentum/volatility.
pub const FEATURE_WINDOW: usize = 20;

/// Samples required before momentum and volatility are emitted.
pub const FEATURE_WINDOW_MIN: usize = FEATURE_WINDOW / 2;

/// Book levels folded into the depth-weighted micro price.
pub const FEATURE_DEPTH_LEVELS: usize = 5;

/// Derived features for one instrument. `NaN` marks "not yet computable".
#[derive(Debug, Clone, Copy)]
pub struct MarketFeatures {
    pub fair_price: f64,
    pub spread: f64,
    pub spread_bps: f64,
    pub imbalance: f64,
    pub micro_price: f64,
    pub vwap: f64,
    pub aggressive_trade_ratio: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub last_update_ns: Nanos,
}

impl MarketFeatures {
    fn invalid() -> Self {
        Self {
            fair_price: f64::NAN,
            spread: f64::NAN,
            spread_bps: f64::NAN,
            imbalance: f64::NAN,
            micro_price: f64::NAN,
            vwap: f64::NAN,
            aggressive_trade_ratio: f64::NAN,
            momentum: f64::NAN,
            volatility: f64::NAN,
            last_update_ns: 0,
        }
    }

    /// True once both top-of-book features are finite numbers.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.fair_price.is_finite() && self.spread.is_finite()
    }
}

impl Default for MarketFeatures {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Fixed circular window of fair/trade prices.
#[derive(Debug, Clone)]
struct PriceWindow {
    samples: [f64; FEATURE_WINDOW],
    pos: usize,
    len: usize,
}

impl PriceWindow {
    fn new() -> Self {
        Self {
            samples: [0.0; FEATURE_WINDOW],
            pos: 0,
            len: 0,
        }
    }

    #[inline]
    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % FEATURE_WINDOW;
        self.len = (self.len + 1).min(FEATURE_WINDOW);
    }

    /// Mean and population variance over the current contents.
    fn mean_var(&self) -> (f64, f64) {
        let n = self.len as f64;
        let mut sum = 0.0;
        for &s in &self.samples[..self.len] {
            sum += s;
        }
        let mean = sum / n;

        let mut var = 0.0;
        for &s in &self.samples[..self.len] {
            let d = s - mean;
            var += d * d;
        }
        (mean, var / n)
    }
}

#[derive(Debug, Clone)]
struct TickerFeatureState {
    features: MarketFeatures,
    window: PriceWindow,
    vwap_notional: u128,
    vwap_volume: u64,
    agg_buy_volume: u64,
    agg_sell_volume: u64,
}

impl TickerFeatureState {
    fn new() -> Self {
        Self {
            features: MarketFeatures::invalid(),
            window: PriceWindow::new(),
            vwap_notional: 0,
            vwap_volume: 0,
            agg_buy_volume: 0,
            agg_sell_volume: 0,
        }
    }

    fn refresh_window_stats(&mut self) {
        if self.window.len < FEATURE_WINDOW_MIN {
            return;
        }
        let (mean, var) = self.window.mean_var();
        if mean > 0.0 {
            let fair = self.features.fair_price;
            if fair.is_finite() {
                self.features.momentum = (fair - mean) / mean * 10_000.0;
            }
            self.features.volatility = var.sqrt() / mean * 10_000.0;
        }
    }
}

/// Derives features for every registered instrument.
pub struct FeatureEngine {
    states: Box<[TickerFeatureState]>,
}

impl FeatureEngine {
    pub fn new(num_tickers: usize) -> Self {
        Self {
            states: (0..num_tickers).map(|_| TickerFeatureState::new()).collect(),
        }
    }

    /// Recompute top-of-book features for `ticker` after a book mutation.
    pub fn on_book_update(&mut self, ticker: TickerId, book: &OrderBook, now_ns: Nanos) {
        let Some(state) = self.states.get_mut(ticker as usize) else {
            return;
        };
        state.features.last_update_ns = now_ns;

        // Crossed books are transient; features are undefined until the
        // next consistent update.
        if book.is_crossed() {
            state.features.fair_price = f64::NAN;
            state.features.spread = f64::NAN;
            state.features.spread_bps = f64::NAN;
            state.features.imbalance = f64::NAN;
            state.features.micro_price = f64::NAN;
            return;
        }

        let bid = book.best_bid();
        let ask = book.best_ask();
        if bid == PRICE_INVALID || ask == PRICE_INVALID {
            state.features.fair_price = f64::NAN;
            state.features.spread = f64::NAN;
            state.features.spread_bps = f64::NAN;
            state.features.imbalance = f64::NAN;
            state.features.micro_price = f64::NAN;
            return;
        }

        let bid_qty = book.best_bid_qty() as f64;
        let ask_qty = book.best_ask_qty() as f64;
        let bid_px = bid as f64;
        let ask_px = ask as f64;

        let spread = ask_px - bid_px;
        let fair = (bid_px * ask_qty + ask_px * bid_qty) / (bid_qty + ask_qty);

        state.features.spread = spread;
        state.features.fair_price = fair;
        state.features.spread_bps = spread / fair * 10_000.0;
        state.features.imbalance = (bid_qty - ask_qty) / (bid_qty + ask_qty);
        state.features.micro_price = (bid_px + ask_px) / 2.0;

        // Size-weighted micro price over the top levels, when both sides
        // carry depth.
        let (dw_bid, dq_bid) = depth_weighted(book, Side::Buy);
        let (dw_ask, dq_ask) = depth_weighted(book, Side::Sell);
        if dq_bid > 0.0 && dq_ask > 0.0 {
            state.features.micro_price = (dw_bid * dq_ask + dw_ask * dq_bid) / (dq_bid + dq_ask);
        }

        state.window.push(fair);
        state.refresh_window_stats();
    }

    /// Fold one trade print into the volume accumulators.
    pub fn on_trade(&mut self, ticker: TickerId, price: Price, qty: Qty, side: Side, now_ns: Nanos) {
        let Some(state) = self.states.get_mut(ticker as usize) else {
            return;
        };
        state.features.last_update_ns = now_ns;

        if price > 0 && qty > 0 {
            state.vwap_notional += price as u128 * qty as u128;
            state.vwap_volume += qty;
            state.features.vwap = state.vwap_notional as f64 / state.vwap_volume as f64;

            match side {
                Side::Buy => state.agg_buy_volume += qty,
                Side::Sell => state.agg_sell_volume += qty,
            }
            let agg_total = state.agg_buy_volume + state.agg_sell_volume;
            state.features.aggressive_trade_ratio =
                state.agg_buy_volume as f64 / agg_total as f64;

            state.window.push(price as f64);
            state.refresh_window_stats();
        }
    }

    /// Current feature snapshot for `ticker`.
    #[inline(always)]
    pub fn features(&self, ticker: TickerId) -> &MarketFeatures {
        &self.states[ticker as usize].features
    }

    pub fn num_tickers(&self) -> usize {
        self.states.len()
    }
}

/// Quantity-weighted price and total quantity over the top levels of one
/// side. Stops at the first empty level.
#[inline]
fn depth_weighted(book: &OrderBook, side: Side) -> (f64, f64) {
    let mut notional = 0.0f64;
    let mut volume = 0.0f64;
    for i in 0..FEATURE_DEPTH_LEVELS {
        let (price, qty, _) = book.level(side, i);
        if qty == 0 {
            break;
        }
        notional += price as f64 * qty as f64;
        volume += qty as f64;
    }
    if volume > 0.0 {
        (notional / volume, volume)
    } else {
        (0.0, 0.0)
    }
}
