//! Fixed-depth aggregated price ladder
//!
//! One instance per registered ticker, mutated only by the trade-engine
//! thread. Levels are aggregated by price, not by order id, and the venue
//! sets the level: `update_bid`/`update_ask` write at the given index and
//! never insert or shift to maintain sort order. Snapshot-style feed
//! handlers call clear-plus-updates; incremental handlers write a specific
//! index. Strategies that need strict sortedness must be fed by a
//! snapshot-style handler.
//!
//! A level with zero quantity is empty regardless of its price. A crossed
//! book is permitted transiently; readers that cannot tolerate it check
//! [`OrderBook::is_crossed`].

use crate::core::types::{Nanos, Price, Qty, Side, TickerId, PRICE_INVALID};

/// Price levels retained per side.
pub const BOOK_DEPTH: usize = 20;

/// One side of the ladder: parallel arrays, level 0 is best.
#[derive(Debug, Clone)]
struct BookSide {
    prices: [Price; BOOK_DEPTH],
    qtys: [Qty; BOOK_DEPTH],
    order_counts: [u32; BOOK_DEPTH],
}

impl BookSide {
    fn new() -> Self {
        Self {
            prices: [PRICE_INVALID; BOOK_DEPTH],
            qtys: [0; BOOK_DEPTH],
            order_counts: [0; BOOK_DEPTH],
        }
    }

    #[inline(always)]
    fn set(&mut self, level: usize, price: Price, qty: Qty, orders: u32) {
        self.prices[level] = price;
        self.qtys[level] = qty;
        self.order_counts[level] = orders;
    }

    fn clear(&mut self) {
        self.prices = [PRICE_INVALID; BOOK_DEPTH];
        self.qtys = [0; BOOK_DEPTH];
        self.order_counts = [0; BOOK_DEPTH];
    }

    /// Leading run of occupied levels.
    fn depth(&self) -> usize {
        self.qtys.iter().take_while(|&&q| q > 0).count()
    }
}

/// Aggregated limit order book for one instrument.
#[derive(Debug, Clone)]
pub struct OrderBook {
    ticker_id: TickerId,
    bids: BookSide,
    asks: BookSide,
    last_update_ns: Nanos,
}

impl OrderBook {
    pub fn new(ticker_id: TickerId) -> Self {
        Self {
            ticker_id,
            bids: BookSide::new(),
            asks: BookSide::new(),
            last_update_ns: 0,
        }
    }

    #[inline(always)]
    pub fn ticker_id(&self) -> TickerId {
        self.ticker_id
    }

    /// Write a bid level. Out-of-range levels are dropped (and trapped in
    /// debug builds).
    #[inline(always)]
    pub fn update_bid(&mut self, level: usize, price: Price, qty: Qty, orders: u32) {
        debug_assert!(level < BOOK_DEPTH, "bid level {level} out of range");
        if level < BOOK_DEPTH {
            self.bids.set(level, price, qty, orders);
        }
    }

    /// Write an ask level.
    #[inline(always)]
    pub fn update_ask(&mut self, level: usize, price: Price, qty: Qty, orders: u32) {
        debug_assert!(level < BOOK_DEPTH, "ask level {level} out of range");
        if level < BOOK_DEPTH {
            self.asks.set(level, price, qty, orders);
        }
    }

    pub fn clear_bids(&mut self) {
        self.bids.clear();
    }

    pub fn clear_asks(&mut self) {
        self.asks.clear();
    }

    /// Best bid price, `PRICE_INVALID` when level 0 is empty.
    #[inline(always)]
    pub fn best_bid(&self) -> Price {
        if self.bids.qtys[0] == 0 {
            PRICE_INVALID
        } else {
            self.bids.prices[0]
        }
    }

    /// Best ask price, `PRICE_INVALID` when level 0 is empty.
    #[inline(always)]
    pub fn best_ask(&self) -> Price {
        if self.asks.qtys[0] == 0 {
            PRICE_INVALID
        } else {
            self.asks.prices[0]
        }
    }

    #[inline(always)]
    pub fn best_bid_qty(&self) -> Qty {
        self.bids.qtys[0]
    }

    #[inline(always)]
    pub fn best_ask_qty(&self) -> Qty {
        self.asks.qtys[0]
    }

    /// Level `i` of one side as `(price, qty, order_count)`. Empty levels
    /// report `(PRICE_INVALID, 0, 0)`.
    #[inline(always)]
    pub fn level(&self, side: Side, i: usize) -> (Price, Qty, u32) {
        let book_side = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        if i >= BOOK_DEPTH || book_side.qtys[i] == 0 {
            (PRICE_INVALID, 0, 0)
        } else {
            (
                book_side.prices[i],
                book_side.qtys[i],
                book_side.order_counts[i],
            )
        }
    }

    /// Both tops occupied and bid at or through the ask.
    #[inline(always)]
    pub fn is_crossed(&self) -> bool {
        self.bids.qtys[0] > 0 && self.asks.qtys[0] > 0 && self.bids.prices[0] >= self.asks.prices[0]
    }

    /// Both tops occupied and not crossed.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.bids.qtys[0] > 0 && self.asks.qtys[0] > 0 && !self.is_crossed()
    }

    pub fn bid_depth(&self) -> usize {
        self.bids.depth()
    }

    pub fn ask_depth(&self) -> usize {
        self.asks.depth()
    }

    /// Record the publisher timestamp of the most recent update.
    #[inline(always)]
    pub fn set_last_update_ns(&mut self, ts_ns: Nanos) {
        self.last_update_ns = ts_ns;
    }

    #[inline(always)]
    pub fn last_update_ns(&self) -> Nanos {
        self.last_update_ns
    }

    /// Staleness of the book relative to `now_ns`.
    pub fn age_ns(&self, now_ns: Nanos) -> Nanos {
        now_ns.saturating_sub(self.last_update_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new(1);
        assert_eq!(book.best_bid(), PRICE_INVALID);
        assert_eq!(book.best_ask(), PRICE_INVALID);
        assert_eq!(book.best_bid_qty(), 0);
        assert_eq!(book.best_ask_qty(), 0);
        assert_eq!(book.bid_depth(), 0);
        assert!(!book.is_valid());
        assert!(!book.is_crossed());
    }

    #[test]
    fn test_update_and_best_levels() {
        let mut book = OrderBook::new(3);
        book.update_bid(0, 10_000, 50, 2);
        book.update_ask(0, 10_010, 75, 3);

        assert_eq!(book.best_bid(), 10_000);
        assert_eq!(book.best_ask(), 10_010);
        assert_eq!(book.best_bid_qty(), 50);
        assert_eq!(book.best_ask_qty(), 75);
        assert_eq!(book.level(Side::Buy, 0), (10_000, 50, 2));
        assert_eq!(book.level(Side::Sell, 0), (10_010, 75, 3));
        assert!(book.is_valid());
    }

    #[test]
    fn test_zero_qty_level_is_empty() {
        let mut book = OrderBook::new(0);
        book.update_bid(0, 10_000, 50, 1);
        book.update_bid(0, 10_000, 0, 0);

        // Price is still written but the level reads as empty.
        assert_eq!(book.best_bid(), PRICE_INVALID);
        assert_eq!(book.level(Side::Buy, 0), (PRICE_INVALID, 0, 0));
    }

    #[test]
    fn test_clear_sides() {
        let mut book = OrderBook::new(0);
        for lvl in 0..5 {
            book.update_bid(lvl, 10_000 - lvl as i64, 10, 1);
            book.update_ask(lvl, 10_010 + lvl as i64, 10, 1);
        }
        assert_eq!(book.bid_depth(), 5);
        assert_eq!(book.ask_depth(), 5);

        book.clear_bids();
        assert_eq!(book.bid_depth(), 0);
        assert_eq!(book.best_bid(), PRICE_INVALID);
        // Asks untouched.
        assert_eq!(book.best_ask(), 10_010);

        book.clear_asks();
        assert_eq!(book.ask_depth(), 0);
    }

    #[test]
    fn test_crossed_book_detection() {
        let mut book = OrderBook::new(0);
        book.update_bid(0, 10_020, 10, 1);
        book.update_ask(0, 10_010, 10, 1);
        assert!(book.is_crossed());
        assert!(!book.is_valid());

        // Locked (bid == ask) also counts as crossed here.
        book.update_bid(0, 10_010, 10, 1);
        assert!(book.is_crossed());

        // One-sided books are never crossed.
        book.update_ask(0, 10_010, 0, 0);
        assert!(!book.is_crossed());
    }

    #[test]
    fn test_venue_sets_the_level() {
        // Writing an out-of-order price at a deeper level is accepted
        // verbatim; the ladder does not resort.
        let mut book = OrderBook::new(0);
        book.update_bid(0, 10_000, 10, 1);
        book.update_bid(1, 10_500, 10, 1);

        assert_eq!(book.level(Side::Buy, 1), (10_500, 10, 1));
        assert_eq!(book.best_bid(), 10_000);
    }

    #[test]
    fn test_timestamps_and_age() {
        let mut book = OrderBook::new(0);
        assert_eq!(book.last_update_ns(), 0);

        book.set_last_update_ns(1_000);
        assert_eq!(book.last_update_ns(), 1_000);
        assert_eq!(book.age_ns(1_500), 500);
        assert_eq!(book.age_ns(500), 0);
    }

    #[test]
    fn test_depth_stops_at_gap() {
        let mut book = OrderBook::new(0);
        book.update_bid(0, 10_000, 10, 1);
        book.update_bid(2, 9_980, 10, 1);
        // Level 1 empty, so the contiguous depth is 1.
        assert_eq!(book.bid_depth(), 1);
    }
}
