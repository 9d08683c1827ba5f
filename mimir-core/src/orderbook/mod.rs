//! Per-instrument limit order book state.

pub mod ladder;

pub use ladder::{OrderBook, BOOK_DEPTH};
