//! Core scalar types, wire records, clock, and error taxonomy.

pub mod clock;
pub mod errors;
pub mod types;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use errors::ConfigError;
pub use types::{
    ClientId, MarketUpdate, MarketUpdateKind, Nanos, OrderId, OrderRequest, OrderRequestKind,
    OrderResponse, OrderResponseKind, OrderState, Price, Qty, Side, TickerId, MAX_TICKERS,
    NANOS_PER_SEC, ORDER_ID_INVALID, PRICE_INVALID, TICKER_ID_INVALID,
};
