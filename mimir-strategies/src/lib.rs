//! Reference strategies for the Mimir trading engine
//!
//! Pure consumers of the core's contracts: they read books, features, and
//! positions, and place, reprice, and cancel orders through the routing
//! context. Nothing here allocates on the hot path.
//!
//! - [`MarketMaker`]: two-sided quoting around fair price with inventory
//!   skew and position-aware sizing
//! - [`LiquidityTaker`]: aggressive marketable orders when tape flow is
//!   one-sided past a threshold

pub mod liquidity_taker;
pub mod market_maker;

pub use liquidity_taker::{LiquidityTaker, LiquidityTakerConfig, TAKER_WINDOW};
pub use market_maker::{MarketMaker, MarketMakerConfig};
