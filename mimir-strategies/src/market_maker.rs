//! Market-making strategy
//!
//! Quotes both sides around the fair price whenever the observed spread
//! is wide enough to pay for the round trip, and leans the quotes against
//! inventory so fills pull the position back toward flat:
//!
//! ```text
//!   Market                       Quotes (flat book)
//!   ══════                       ══════════════════
//!   spread_bps > threshold  ──►  bid = fair - spread/2 - skew
//!                                ask = fair + spread/2 - skew
//!
//!   skew = fair * (position / max_position) * max_skew_bps / 10^4
//! ```
//!
//! Long inventory shifts both quotes down (sells become more attractive,
//! buys less), short inventory shifts them up. Sizing halves once the
//! position passes half of its limit. Resting orders are repriced through
//! the router's `move_orders`; missing sides are created fresh.

use mimir_core::engine::{OrderRouter, Strategy};
use mimir_core::features::MarketFeatures;
use mimir_core::orderbook::OrderBook;
use mimir_core::{MarketUpdate, Price, Qty, Side, TickerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketMakerConfig {
    /// Quote only when the observed spread exceeds this, in bps.
    pub min_spread_bps: f64,
    pub order_size: Qty,
    /// Absolute position bound used to normalize the inventory skew.
    pub max_position: i64,
    /// Skew applied at full inventory, in bps of fair price.
    pub max_skew_bps: f64,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            min_spread_bps: 2.0,
            order_size: 10,
            max_position: 100,
            max_skew_bps: 5.0,
        }
    }
}

/// Inventory-aware two-sided quoter.
pub struct MarketMaker {
    config: MarketMakerConfig,
}

impl MarketMaker {
    pub fn new(config: MarketMakerConfig) -> Self {
        Self { config }
    }

    /// Quote targets for the current fair price and inventory.
    #[inline(always)]
    fn quote_targets(&self, features: &MarketFeatures, position: i64) -> Option<(Price, Price)> {
        let fair = features.fair_price;
        let half = features.spread / 2.0;

        let ratio = if self.config.max_position > 0 {
            (position as f64 / self.config.max_position as f64).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let skew = fair * ratio * self.config.max_skew_bps / 10_000.0;

        let bid = (fair - half - skew).floor() as Price;
        let ask = (fair + half - skew).ceil() as Price;
        (bid > 0 && ask > bid).then_some((bid, ask))
    }

    /// Full size near flat, half size once inventory passes half its cap.
    #[inline(always)]
    fn clip(&self, position: i64) -> Qty {
        if position.unsigned_abs() * 2 > self.config.max_position.unsigned_abs() {
            self.config.order_size / 2
        } else {
            self.config.order_size
        }
    }
}

impl Strategy for MarketMaker {
    fn on_book_update(
        &mut self,
        ticker: TickerId,
        _book: &OrderBook,
        features: &MarketFeatures,
        router: &mut OrderRouter,
    ) {
        if !features.is_valid() || features.spread_bps <= self.config.min_spread_bps {
            return;
        }

        let position = router.position(ticker).net_position;
        let Some((bid_target, ask_target)) = self.quote_targets(features, position) else {
            return;
        };
        let clip = self.clip(position);
        if clip == 0 {
            return;
        }

        router.move_orders(ticker, bid_target, ask_target, clip);

        if router.orders().active_count(ticker, Side::Buy) == 0 {
            router.send_order(ticker, Side::Buy, bid_target, clip);
        }
        if router.orders().active_count(ticker, Side::Sell) == 0 {
            router.send_order(ticker, Side::Sell, ask_target, clip);
        }
    }

    fn on_trade(
        &mut self,
        _update: &MarketUpdate,
        _features: &MarketFeatures,
        _router: &mut OrderRouter,
    ) {
    }

    fn name(&self) -> &'static str {
        "MarketMaker"
    }
}
