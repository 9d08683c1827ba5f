//! Construction-time error types
//!
//! Nothing on the hot path unwinds. Operations that can fail at runtime
//! return result codes or nullable handles; these errors cover engine
//! assembly and configuration, where failing loudly is the right call.

use thiserror::Error;

use crate::core::types::MAX_TICKERS;

/// Errors raised while assembling an engine from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("ticker count {0} exceeds the supported maximum of {MAX_TICKERS}")]
    TooManyTickers(usize),

    #[error("{what} capacity must be a non-zero power of two, got {got}")]
    BadCapacity { what: &'static str, got: usize },

    #[error("order rate limit must be non-zero")]
    ZeroOrderRate,

    #[error("price band is empty: min {min} > max {max}")]
    EmptyPriceBand { min: i64, max: i64 },
}
