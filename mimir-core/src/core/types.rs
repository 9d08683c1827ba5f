//! Zero-overhead core types for the trading engine
//!
//! All prices and quantities are integer fixed-point (venue scale factor
//! agreed out-of-band), so hot-path arithmetic is exact and branch-free.
//! Every record that crosses a ring is plain old data with copy semantics.

use std::fmt;

/// Dense instrument identifier in `[0, MAX_TICKERS)`.
pub type TickerId = u32;

/// Engine-assigned order identifier, monotonically increasing.
pub type OrderId = u64;

/// Identifier of the trading account/session.
pub type ClientId = u32;

/// Fixed-point price. `PRICE_INVALID` marks "no price".
pub type Price = i64;

/// Fixed-point quantity.
pub type Qty = u64;

/// Nanoseconds from the engine's monotonic epoch.
pub type Nanos = u64;

/// Sentinel for an absent price (empty book level, unpriced order).
pub const PRICE_INVALID: Price = i64::MAX;

/// Sentinel for an unassigned order id.
pub const ORDER_ID_INVALID: OrderId = u64::MAX;

/// Sentinel for an unknown instrument.
pub const TICKER_ID_INVALID: TickerId = u32::MAX;

/// Upper bound on registered instruments. Storage is direct-indexed by
/// `TickerId`, so this bounds every per-instrument array in the engine.
pub const MAX_TICKERS: usize = 64;

pub const NANOS_PER_SEC: Nanos = 1_000_000_000;

/// Order side.
///
/// Wire encoding is 1 = buy, 2 = sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Side {
    #[default]
    Buy = 1,
    Sell = 2,
}

impl Side {
    /// Sign of the position delta this side produces (+1 buy, -1 sell).
    #[inline(always)]
    pub const fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    #[inline(always)]
    pub const fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order lifecycle state.
///
/// ```text
/// PendingNew ──► Live ──┬──► PendingCancel ──► Canceled*
///      │                ├──► PendingModify ──► Live
///      │                ├──► Filled*
///      ▼                │
///  Rejected*            └──► Rejected*
/// ```
///
/// Terminal states are marked `*`; a terminal order's table slot is
/// released once the terminal event has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderState {
    #[default]
    PendingNew = 0,
    Live = 1,
    PendingCancel = 2,
    PendingModify = 3,
    Filled = 4,
    Canceled = 5,
    Rejected = 6,
}

impl OrderState {
    #[inline(always)]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Canceled | OrderState::Rejected
        )
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderState::PendingNew => "PENDING_NEW",
            OrderState::Live => "LIVE",
            OrderState::PendingCancel => "PENDING_CANCEL",
            OrderState::PendingModify => "PENDING_MODIFY",
            OrderState::Filled => "FILLED",
            OrderState::Canceled => "CANCELED",
            OrderState::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// Kind of an inbound market-data event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MarketUpdateKind {
    #[default]
    Bid = 0,
    Ask = 1,
    Trade = 2,
}

/// One market-data event as delivered by a feed handler.
///
/// Bid/Ask events carry an aggregated top-of-book level (level 0 by
/// convention); Trade events carry the aggressor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarketUpdate {
    pub kind: MarketUpdateKind,
    pub ticker_id: TickerId,
    pub price: Price,
    pub qty: Qty,
    pub side: Side,
    pub ts_ns: Nanos,
}

/// Kind of an outbound order request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderRequestKind {
    #[default]
    New = 0,
    Cancel = 1,
    Modify = 2,
}

/// One order instruction for a venue gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderRequest {
    pub kind: OrderRequestKind,
    pub client_id: ClientId,
    pub ticker_id: TickerId,
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub ts_ns: Nanos,
}

/// Kind of an execution report from a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderResponseKind {
    #[default]
    Ack = 0,
    Fill = 1,
    Cancel = 2,
    Reject = 3,
}

/// One execution report. For fills, `qty` is the fill quantity of this
/// report and `leaves_qty` the remaining open quantity after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderResponse {
    pub kind: OrderResponseKind,
    pub client_id: ClientId,
    pub ticker_id: TickerId,
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub leaves_qty: Qty,
    pub ts_ns: Nanos,
}
