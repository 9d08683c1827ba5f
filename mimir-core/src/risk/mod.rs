//! Pre-trade risk admission
//!
//! Constant-time checks against per-ticker mirrors of position and P&L.
//! The check order is fixed and part of the contract: the first failing
//! check is the one reported, and a failed check leaves no side effects.
//! Only a pass consumes from the rolling one-second rate window.
//!
//! Mirrors are pushed in by the trade engine after it applies fills and
//! trade prints; the risk manager never reaches into other components.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::{Nanos, Price, Qty, Side, TickerId, NANOS_PER_SEC};
use crate::transport::CacheAligned;

/// Static per-ticker limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Cap on `|position * last trade price|` after the hypothetical fill.
    pub max_position_value: i64,
    /// Trading halts once realized plus unrealized P&L drops below the
    /// negated value.
    pub max_loss: i64,
    pub max_order_size: Qty,
    pub max_order_rate_per_sec: u32,
    pub min_price: Price,
    pub max_price: Price,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_value: 1_000_000_000,
            max_loss: 100_000_000,
            max_order_size: 1_000_000,
            max_order_rate_per_sec: 100,
            min_price: 1,
            max_price: i64::MAX / 2,
        }
    }
}

/// Admission verdict. Declaration order is the evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RiskCheckResult {
    Pass = 0,
    TickerNotRegistered = 1,
    OrderSizeBreach = 2,
    InvalidPrice = 3,
    PositionLimitBreach = 4,
    LossLimitBreach = 5,
    OrderRateBreach = 6,
}

impl RiskCheckResult {
    #[inline(always)]
    pub fn passed(self) -> bool {
        matches!(self, RiskCheckResult::Pass)
    }
}

impl fmt::Display for RiskCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskCheckResult::Pass => "PASS",
            RiskCheckResult::TickerNotRegistered => "TICKER_NOT_REGISTERED",
            RiskCheckResult::OrderSizeBreach => "ORDER_SIZE_BREACH",
            RiskCheckResult::InvalidPrice => "INVALID_PRICE",
            RiskCheckResult::PositionLimitBreach => "POSITION_LIMIT_BREACH",
            RiskCheckResult::LossLimitBreach => "LOSS_LIMIT_BREACH",
            RiskCheckResult::OrderRateBreach => "ORDER_RATE_BREACH",
        };
        write!(f, "{}", s)
    }
}

/// Live risk state for one instrument.
#[derive(Debug, Clone, Copy)]
struct TickerRisk {
    config: RiskConfig,
    /// Net position mirror.
    position: i64,
    /// `position * last_price` mirror, for observability.
    notional: i64,
    /// Last observed trade price; 0 until the first print.
    last_price: Price,
    realized_pnl: i64,
    unrealized_pnl: i64,
    /// Orders admitted in the current one-second window.
    orders_this_sec: u32,
    last_order_ns: Nanos,
}

impl TickerRisk {
    fn new(config: RiskConfig) -> Self {
        Self {
            config,
            position: 0,
            notional: 0,
            last_price: 0,
            realized_pnl: 0,
            unrealized_pnl: 0,
            orders_this_sec: 0,
            last_order_ns: 0,
        }
    }
}

/// Counters per rejection cause, readable off the hot path.
#[derive(Debug, Default, Clone, Copy)]
pub struct RiskCounters {
    pub passed: u64,
    pub ticker_not_registered: u64,
    pub order_size_breach: u64,
    pub invalid_price: u64,
    pub position_limit_breach: u64,
    pub loss_limit_breach: u64,
    pub order_rate_breach: u64,
}

impl RiskCounters {
    pub fn rejected(&self) -> u64 {
        self.ticker_not_registered
            + self.order_size_breach
            + self.invalid_price
            + self.position_limit_breach
            + self.loss_limit_breach
            + self.order_rate_breach
    }

    fn record(&mut self, result: RiskCheckResult) {
        match result {
            RiskCheckResult::Pass => self.passed += 1,
            RiskCheckResult::TickerNotRegistered => self.ticker_not_registered += 1,
            RiskCheckResult::OrderSizeBreach => self.order_size_breach += 1,
            RiskCheckResult::InvalidPrice => self.invalid_price += 1,
            RiskCheckResult::PositionLimitBreach => self.position_limit_breach += 1,
            RiskCheckResult::LossLimitBreach => self.loss_limit_breach += 1,
            RiskCheckResult::OrderRateBreach => self.order_rate_breach += 1,
        }
    }
}

/// Deterministic pre-trade admission and rate limiting.
pub struct RiskManager {
    tickers: Box<[CacheAligned<TickerRisk>]>,
    counters: RiskCounters,
}

impl RiskManager {
    /// One state per registered ticker, all starting from `config`.
    pub fn new(num_tickers: usize, config: RiskConfig) -> Self {
        Self {
            tickers: (0..num_tickers)
                .map(|_| CacheAligned::new(TickerRisk::new(config)))
                .collect(),
            counters: RiskCounters::default(),
        }
    }

    /// Replace the limits for one ticker.
    pub fn set_config(&mut self, ticker: TickerId, config: RiskConfig) {
        if let Some(cell) = self.tickers.get_mut(ticker as usize) {
            cell.config = config;
        }
    }

    pub fn config(&self, ticker: TickerId) -> Option<&RiskConfig> {
        self.tickers.get(ticker as usize).map(|c| &c.config)
    }

    /// Mirrored `position * last_price` for one ticker.
    pub fn notional(&self, ticker: TickerId) -> Option<i64> {
        self.tickers.get(ticker as usize).map(|c| c.notional)
    }

    /// Admission check. First failure wins; a pass consumes one slot of
    /// the rolling rate window.
    pub fn check_order(
        &mut self,
        ticker: TickerId,
        side: Side,
        price: Price,
        qty: Qty,
        now_ns: Nanos,
    ) -> RiskCheckResult {
        let result = self.evaluate(ticker, side, price, qty, now_ns);
        self.counters.record(result);
        if !result.passed() {
            tracing::debug!(ticker, %side, price, qty, %result, "order rejected by risk");
        }
        result
    }

    fn evaluate(
        &mut self,
        ticker: TickerId,
        side: Side,
        price: Price,
        qty: Qty,
        now_ns: Nanos,
    ) -> RiskCheckResult {
        // 1. Ticker registered.
        let Some(cell) = self.tickers.get_mut(ticker as usize) else {
            return RiskCheckResult::TickerNotRegistered;
        };
        let state = &mut **cell;

        // 2. Order size.
        if qty > state.config.max_order_size {
            return RiskCheckResult::OrderSizeBreach;
        }

        // 3. Price band.
        if price < state.config.min_price || price > state.config.max_price {
            return RiskCheckResult::InvalidPrice;
        }

        // 4. Hypothetical position value, marked at the last trade print.
        let hypothetical = state.position + side.sign() * qty as i64;
        let value = (hypothetical as i128 * state.last_price as i128).abs();
        if value > state.config.max_position_value as i128 {
            return RiskCheckResult::PositionLimitBreach;
        }

        // 5. Loss limit on total P&L.
        let total_pnl = state.realized_pnl.saturating_add(state.unrealized_pnl);
        if total_pnl < -state.config.max_loss {
            return RiskCheckResult::LossLimitBreach;
        }

        // 6. Rolling one-second rate. The window count resets lazily; on
        // failure nothing is stored, so a rejected call has no effect.
        let window_count = if now_ns.saturating_sub(state.last_order_ns) >= NANOS_PER_SEC {
            0
        } else {
            state.orders_this_sec
        };
        if window_count + 1 > state.config.max_order_rate_per_sec {
            return RiskCheckResult::OrderRateBreach;
        }

        state.orders_this_sec = window_count + 1;
        state.last_order_ns = now_ns;
        RiskCheckResult::Pass
    }

    /// Mirror the net position after a fill.
    pub fn update_position(&mut self, ticker: TickerId, net_position: i64) {
        if let Some(cell) = self.tickers.get_mut(ticker as usize) {
            cell.position = net_position;
            cell.notional = net_position.saturating_mul(cell.last_price);
        }
    }

    /// Mirror the last observed trade price.
    pub fn update_market_price(&mut self, ticker: TickerId, price: Price) {
        if let Some(cell) = self.tickers.get_mut(ticker as usize) {
            cell.last_price = price;
            cell.notional = cell.position.saturating_mul(price);
        }
    }

    /// Mirror realized and unrealized P&L totals for the ticker.
    pub fn update_pnl(&mut self, ticker: TickerId, realized: i64, unrealized: i64) {
        if let Some(cell) = self.tickers.get_mut(ticker as usize) {
            cell.realized_pnl = realized;
            cell.unrealized_pnl = unrealized;
        }
    }

    /// Emergency control: zero every position and notional mirror. Not for
    /// the hot path.
    pub fn flatten_all(&mut self) {
        for cell in self.tickers.iter_mut() {
            cell.position = 0;
            cell.notional = 0;
        }
        tracing::warn!("risk mirrors flattened for all tickers");
    }

    pub fn counters(&self) -> &RiskCounters {
        &self.counters
    }

    pub fn num_tickers(&self) -> usize {
        self.tickers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tight_config() -> RiskConfig {
        RiskConfig {
            max_position_value: 100,
            max_loss: 1_000,
            max_order_size: 10,
            max_order_rate_per_sec: 1,
            min_price: 1,
            max_price: 1_000,
        }
    }

    #[test]
    fn test_rate_window() {
        // max rate 1/sec: pass, immediate repeat rejected, next second
        // passes again.
        let mut risk = RiskManager::new(1, tight_config());

        assert_eq!(
            risk.check_order(0, Side::Buy, 500, 1, 0),
            RiskCheckResult::Pass
        );
        assert_eq!(
            risk.check_order(0, Side::Buy, 500, 1, 0),
            RiskCheckResult::OrderRateBreach
        );
        assert_eq!(
            risk.check_order(0, Side::Buy, 500, 1, NANOS_PER_SEC),
            RiskCheckResult::Pass
        );
    }

    #[test]
    fn test_check_ordering_first_failure_wins() {
        let mut risk = RiskManager::new(1, tight_config());

        // Oversized AND mispriced: size is checked first.
        assert_eq!(
            risk.check_order(0, Side::Buy, 5_000, 100, 0),
            RiskCheckResult::OrderSizeBreach
        );

        // Mispriced AND position-breaching: price is checked first.
        risk.update_market_price(0, 500);
        risk.update_position(0, 10);
        assert_eq!(
            risk.check_order(0, Side::Buy, 5_000, 1, 0),
            RiskCheckResult::InvalidPrice
        );
    }

    #[test]
    fn test_unregistered_ticker() {
        let mut risk = RiskManager::new(1, tight_config());
        assert_eq!(
            risk.check_order(5, Side::Buy, 500, 1, 0),
            RiskCheckResult::TickerNotRegistered
        );
        assert_eq!(risk.counters().ticker_not_registered, 1);
    }

    #[test]
    fn test_price_band() {
        let mut risk = RiskManager::new(1, tight_config());
        assert_eq!(
            risk.check_order(0, Side::Buy, 0, 1, 0),
            RiskCheckResult::InvalidPrice
        );
        assert_eq!(
            risk.check_order(0, Side::Buy, 1_001, 1, 0),
            RiskCheckResult::InvalidPrice
        );
        // Band edges are inclusive.
        assert_eq!(
            risk.check_order(0, Side::Sell, 1_000, 1, 0),
            RiskCheckResult::Pass
        );
    }

    #[test]
    fn test_position_value_marked_at_last_trade() {
        let mut risk = RiskManager::new(1, tight_config());

        // No trade print yet: value is zero, any position passes.
        assert_eq!(
            risk.check_order(0, Side::Buy, 500, 1, 0),
            RiskCheckResult::Pass
        );

        // Position 10 marked at 50: one more buy would be 11 * 50 = 550.
        risk.update_market_price(0, 50);
        risk.update_position(0, 10);
        assert_eq!(
            risk.check_order(0, Side::Buy, 500, 1, NANOS_PER_SEC),
            RiskCheckResult::PositionLimitBreach
        );

        // Selling reduces the hypothetical: 2 * 50 = 100 is at the cap.
        assert_eq!(
            risk.check_order(0, Side::Sell, 500, 8, NANOS_PER_SEC),
            RiskCheckResult::Pass
        );
    }

    #[test]
    fn test_loss_limit() {
        let mut risk = RiskManager::new(1, tight_config());
        risk.update_pnl(0, -800, -300);

        assert_eq!(
            risk.check_order(0, Side::Buy, 500, 1, 0),
            RiskCheckResult::LossLimitBreach
        );

        // Exactly at the limit still trades.
        risk.update_pnl(0, -800, -200);
        assert_eq!(
            risk.check_order(0, Side::Buy, 500, 1, 0),
            RiskCheckResult::Pass
        );
    }

    #[test]
    fn test_rejection_leaves_no_side_effects() {
        let mut risk = RiskManager::new(1, tight_config());

        // Burn the rate window.
        assert!(risk.check_order(0, Side::Buy, 500, 1, 0).passed());

        // Size rejections do not touch the window; after the second
        // elapses the next order passes regardless of how many rejects
        // happened in between.
        for _ in 0..5 {
            assert_eq!(
                risk.check_order(0, Side::Buy, 500, 100, NANOS_PER_SEC / 2),
                RiskCheckResult::OrderSizeBreach
            );
        }
        assert_eq!(
            risk.check_order(0, Side::Buy, 500, 1, NANOS_PER_SEC),
            RiskCheckResult::Pass
        );
    }

    #[test]
    fn test_determinism() {
        let mut a = RiskManager::new(1, tight_config());
        let mut b = RiskManager::new(1, tight_config());
        a.update_market_price(0, 40);
        b.update_market_price(0, 40);
        a.update_position(0, 2);
        b.update_position(0, 2);

        for (side, price, qty, now) in [
            (Side::Buy, 500i64, 1u64, 0u64),
            (Side::Sell, 999, 2, 10),
            (Side::Buy, 1_200, 1, 20),
            (Side::Buy, 500, 11, 30),
        ] {
            assert_eq!(
                a.check_order(0, side, price, qty, now),
                b.check_order(0, side, price, qty, now)
            );
        }
    }

    #[test]
    fn test_rate_boundary_r_plus_one() {
        let mut config = tight_config();
        config.max_order_rate_per_sec = 3;
        let mut risk = RiskManager::new(1, config);

        for i in 0..3 {
            assert!(risk.check_order(0, Side::Buy, 500, 1, i).passed());
        }
        assert_eq!(
            risk.check_order(0, Side::Buy, 500, 1, 3),
            RiskCheckResult::OrderRateBreach
        );
        // First order of the next second passes.
        assert!(risk
            .check_order(0, Side::Buy, 500, 1, 2 + NANOS_PER_SEC)
            .passed());
    }

    #[test]
    fn test_flatten_all() {
        let mut risk = RiskManager::new(2, tight_config());
        risk.update_market_price(0, 50);
        risk.update_position(0, 10);
        risk.update_market_price(1, 50);
        risk.update_position(1, -10);
        assert_eq!(risk.notional(0), Some(500));
        assert_eq!(risk.notional(1), Some(-500));

        risk.flatten_all();
        assert_eq!(risk.notional(0), Some(0));
        assert_eq!(risk.notional(1), Some(0));

        // With mirrors zeroed, position checks start from flat again.
        assert!(risk.check_order(0, Side::Buy, 500, 1, 0).passed());
        assert!(risk.check_order(1, Side::Buy, 500, 1, 0).passed());
    }

    #[test]
    fn test_counters() {
        let mut risk = RiskManager::new(1, tight_config());
        risk.check_order(0, Side::Buy, 500, 1, 0);
        risk.check_order(0, Side::Buy, 500, 100, 0);
        risk.check_order(0, Side::Buy, 0, 1, 0);

        let c = risk.counters();
        assert_eq!(c.passed, 1);
        assert_eq!(c.order_size_breach, 1);
        assert_eq!(c.invalid_price, 1);
        assert_eq!(c.rejected(), 2);
    }
}
