//! Position and P&L accounting
//!
//! Weighted-average-cost convention: each side keeps cumulative volume and
//! notional, the average price is the exact integer division of the two,
//! and realized P&L accrues only on sells against prior buy inventory.
//! Unrealized P&L marks the net position against the last observed trade
//! price and is maintained by delta so the aggregate total stays
//! consistent without recomputation.
//!
//! Per-ticker records are mutated only by the trade-engine thread; the
//! aggregate totals are relaxed atomics so other threads can read them.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::core::types::{Price, Qty, Side, TickerId};
use crate::transport::CacheAligned;

/// Accounting state for one instrument.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionInfo {
    /// Net position: buy volume minus sell volume.
    pub net_position: i64,
    pub buy_volume: u64,
    pub sell_volume: u64,
    pub buy_notional: i128,
    pub sell_notional: i128,
    /// `buy_notional / buy_volume`, 0 until the first buy.
    pub avg_buy_price: Price,
    /// `sell_notional / sell_volume`, 0 until the first sell.
    pub avg_sell_price: Price,
    pub realized_pnl: i64,
    pub unrealized_pnl: i64,
    /// Last observed trade price, 0 until the first market print.
    pub last_price: Price,
}

impl PositionInfo {
    #[inline(always)]
    pub fn total_pnl(&self) -> i64 {
        self.realized_pnl.saturating_add(self.unrealized_pnl)
    }
}

/// Per-instrument accounting fed from execution and trade events.
pub struct PositionKeeper {
    positions: Box<[CacheAligned<PositionInfo>]>,
    total_realized: AtomicI64,
    total_unrealized: AtomicI64,
}

impl PositionKeeper {
    pub fn new(num_tickers: usize) -> Self {
        Self {
            positions: (0..num_tickers)
                .map(|_| CacheAligned::new(PositionInfo::default()))
                .collect(),
            total_realized: AtomicI64::new(0),
            total_unrealized: AtomicI64::new(0),
        }
    }

    /// Apply one execution.
    pub fn on_fill(&mut self, ticker: TickerId, side: Side, qty: Qty, price: Price) {
        let Some(cell) = self.positions.get_mut(ticker as usize) else {
            return;
        };
        let pos = &mut **cell;

        match side {
            Side::Buy => {
                pos.buy_volume += qty;
                pos.buy_notional += price as i128 * qty as i128;
                pos.avg_buy_price = (pos.buy_notional / pos.buy_volume as i128) as Price;
                pos.net_position += qty as i64;
            }
            Side::Sell => {
                pos.sell_volume += qty;
                pos.sell_notional += price as i128 * qty as i128;
                pos.avg_sell_price = (pos.sell_notional / pos.sell_volume as i128) as Price;
                pos.net_position -= qty as i64;

                if pos.avg_buy_price > 0 {
                    let delta =
                        clamp_i64(qty as i128 * (price - pos.avg_buy_price) as i128);
                    pos.realized_pnl = pos.realized_pnl.saturating_add(delta);
                    self.total_realized.fetch_add(delta, Ordering::Relaxed);
                }
            }
        }

        Self::mark(&self.total_unrealized, pos, price);
    }

    /// Apply a market trade print: remember the price and remark.
    pub fn update_market_price(&mut self, ticker: TickerId, price: Price) {
        let Some(cell) = self.positions.get_mut(ticker as usize) else {
            return;
        };
        cell.last_price = price;
        Self::mark(&self.total_unrealized, &mut **cell, price);
    }

    /// Recompute unrealized P&L against `price` and fold the delta into
    /// the aggregate total.
    fn mark(total_unrealized: &AtomicI64, pos: &mut PositionInfo, price: Price) {
        let reference = if pos.net_position > 0 {
            pos.avg_buy_price
        } else {
            pos.avg_sell_price
        };

        let fresh = if pos.net_position != 0 && reference > 0 {
            clamp_i64(pos.net_position as i128 * (price - reference) as i128)
        } else {
            0
        };

        let delta = fresh - pos.unrealized_pnl;
        pos.unrealized_pnl = fresh;
        total_unrealized.fetch_add(delta, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn position(&self, ticker: TickerId) -> &PositionInfo {
        &self.positions[ticker as usize]
    }

    pub fn num_tickers(&self) -> usize {
        self.positions.len()
    }

    pub fn total_realized_pnl(&self) -> i64 {
        self.total_realized.load(Ordering::Relaxed)
    }

    pub fn total_unrealized_pnl(&self) -> i64 {
        self.total_unrealized.load(Ordering::Relaxed)
    }

    pub fn total_pnl(&self) -> i64 {
        self.total_realized_pnl()
            .saturating_add(self.total_unrealized_pnl())
    }

    /// Gross exposure: sum of `|position * last_price|` over all tickers.
    pub fn total_exposure(&self) -> i64 {
        let mut total: i128 = 0;
        for cell in self.positions.iter() {
            total += (cell.net_position as i128 * cell.last_price as i128).abs();
        }
        clamp_i64(total)
    }
}

#[inline(always)]
fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
