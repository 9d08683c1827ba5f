//! Mimir Core - Ultra-Low-Latency Multi-Venue Trading Runtime
//!
//! The in-process dataflow of a trading engine: ingest live market data,
//! maintain per-instrument order books, derive microstructure features,
//! apply pre-trade risk, route strategy orders, and track positions and
//! P&L, all inside sub-microsecond per-event budgets on a pinned core.
//!
//! ## Architecture
//! - **Zero heap allocations** on any hot path after warm-up
//! - **No blocking calls** inside the event loop (a CPU pause hint at
//!   most; never a park, yield, or lock)
//! - **Cache-line aligned** shared state (64 bytes)
//! - **Integer fixed-point** prices and quantities everywhere; floats
//!   only at the feature-emission boundary
//!
//! ## Core Modules
//! - `transport`: cache isolation, bounded pools, SPSC/MPMC rings
//! - `orderbook`: fixed-depth aggregated ladders
//! - `features`: fair price, imbalance, VWAP, momentum, volatility
//! - `position`: weighted-average-cost position and P&L accounting
//! - `risk`: deterministic pre-trade admission and rate limiting
//! - `oms`: direct-indexed order table and lifecycle state machine
//! - `engine`: the single-threaded event loop tying it all together
//! - `perf`: CPU pinning and real-time priority
//!
//! Venue adapters (wire decoders, order gateways, auth, persistence) are
//! external collaborators: they speak to the core only through the
//! market-data ring, the request ring, and the response ring.

pub mod core;
pub mod engine;
pub mod features;
pub mod oms;
pub mod orderbook;
pub mod position;
pub mod risk;
pub mod transport;

// Performance utilities
pub mod perf;
pub mod utils;

// Re-export the types adapters and strategies touch most.
pub use crate::core::{
    Clock, ManualClock, MarketUpdate, MarketUpdateKind, MonotonicClock, OrderId, OrderRequest,
    OrderRequestKind, OrderResponse, OrderResponseKind, OrderState, Price, Qty, Side, TickerId,
    MAX_TICKERS, NANOS_PER_SEC, PRICE_INVALID,
};
pub use engine::{
    EngineConfig, EngineStats, OrderRouter, RequestHandle, Strategy, TradeEngine, N_MD_DRAIN,
    N_RESP_DRAIN,
};
pub use features::{FeatureEngine, MarketFeatures};
pub use oms::{Order, OrderManager, MAX_ORDERS};
pub use orderbook::{OrderBook, BOOK_DEPTH};
pub use position::{PositionInfo, PositionKeeper};
pub use risk::{RiskCheckResult, RiskConfig, RiskManager};
pub use transport::{spsc_ring, CacheAligned, MpmcQueue, ObjectPool, PoolHandle};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::core::{
        Clock, MarketUpdate, MarketUpdateKind, MonotonicClock, OrderId, OrderResponse,
        OrderResponseKind, OrderState, Price, Qty, Side, TickerId, PRICE_INVALID,
    };
    pub use crate::engine::{EngineConfig, OrderRouter, Strategy, TradeEngine};
    pub use crate::features::MarketFeatures;
    pub use crate::orderbook::OrderBook;
    pub use crate::risk::RiskConfig;
    pub use crate::transport::spsc_ring;
}
