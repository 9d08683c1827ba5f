//! Order table and lifecycle state machine
//!
//! Orders live in a direct-indexed array of `MAX_ORDERS` cache-isolated
//! entries. Ids are assigned from a monotonic counter and an order always
//! occupies slot `id % MAX_ORDERS`; when the natural slot of the next id
//! is still occupied, creation probes forward over candidate ids (bounded
//! by the table size) so the slot identity is preserved and lookup stays
//! O(1). A terminal update marks the slot inactive, which is what lets a
//! later id wrap onto it.
//!
//! Updates for unknown ids are logged and discarded: duplicates from a
//! gateway replay are benign.

use crate::core::types::{
    ClientId, Nanos, OrderId, OrderState, Price, Qty, Side, TickerId,
};
use crate::transport::CacheAligned;

/// Size of the order table. Bounds the number of simultaneously active
/// orders across all tickers.
pub const MAX_ORDERS: usize = 1024;

/// One tracked order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Order {
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub ticker_id: TickerId,
    pub side: Side,
    pub price: Price,
    pub original_qty: Qty,
    pub filled_qty: Qty,
    pub leaves_qty: Qty,
    pub state: OrderState,
    pub created_ns: Nanos,
    pub updated_ns: Nanos,
}

#[derive(Debug, Clone, Copy, Default)]
struct OrderEntry {
    order: Order,
    active: bool,
}

/// A repricing decision produced by [`OrderManager::move_orders`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Repricing {
    pub order_id: OrderId,
    pub ticker_id: TickerId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
}

/// Direct-indexed order storage and lifecycle transitions.
pub struct OrderManager {
    entries: Box<[CacheAligned<OrderEntry>]>,
    next_order_id: OrderId,
    client_id: ClientId,
}

impl OrderManager {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            entries: (0..MAX_ORDERS)
                .map(|_| CacheAligned::new(OrderEntry::default()))
                .collect(),
            next_order_id: 1,
            client_id,
        }
    }

    #[inline(always)]
    fn slot_of(order_id: OrderId) -> usize {
        (order_id % MAX_ORDERS as OrderId) as usize
    }

    #[inline]
    fn entry(&self, order_id: OrderId) -> Option<&OrderEntry> {
        let entry = &*self.entries[Self::slot_of(order_id)];
        (entry.active && entry.order.order_id == order_id).then_some(entry)
    }

    #[inline]
    fn entry_mut(&mut self, order_id: OrderId) -> Option<&mut OrderEntry> {
        let entry = &mut *self.entries[Self::slot_of(order_id)];
        (entry.active && entry.order.order_id == order_id).then_some(entry)
    }

    /// Create a PENDING_NEW order. Returns `None` when no free slot can be
    /// found within one full probe of the table.
    pub fn create_order(
        &mut self,
        ticker_id: TickerId,
        side: Side,
        price: Price,
        qty: Qty,
        now_ns: Nanos,
    ) -> Option<&Order> {
        for attempt in 0..MAX_ORDERS as OrderId {
            let order_id = self.next_order_id.wrapping_add(attempt);
            let slot = Self::slot_of(order_id);
            if self.entries[slot].active {
                continue;
            }

            self.next_order_id = order_id.wrapping_add(1);
            let entry = &mut *self.entries[slot];
            entry.active = true;
            entry.order = Order {
                order_id,
                client_id: self.client_id,
                ticker_id,
                side,
                price,
                original_qty: qty,
                filled_qty: 0,
                leaves_qty: qty,
                state: OrderState::PendingNew,
                created_ns: now_ns,
                updated_ns: now_ns,
            };
            return Some(&self.entries[slot].order);
        }

        tracing::warn!("order table full, creation failed");
        None
    }

    /// Request cancellation of a LIVE order. Returns false for unknown ids
    /// or incompatible states.
    pub fn cancel_order(&mut self, order_id: OrderId, now_ns: Nanos) -> bool {
        match self.entry_mut(order_id) {
            Some(entry) if entry.order.state == OrderState::Live => {
                entry.order.state = OrderState::PendingCancel;
                entry.order.updated_ns = now_ns;
                true
            }
            Some(entry) => {
                tracing::debug!(
                    order_id,
                    state = %entry.order.state,
                    "cancel refused in current state"
                );
                false
            }
            None => false,
        }
    }

    /// Request a price/quantity change on a LIVE order. The new quantity
    /// must exceed what is already filled.
    pub fn modify_order(
        &mut self,
        order_id: OrderId,
        new_price: Price,
        new_qty: Qty,
        now_ns: Nanos,
    ) -> bool {
        match self.entry_mut(order_id) {
            Some(entry)
                if entry.order.state == OrderState::Live && new_qty > entry.order.filled_qty =>
            {
                entry.order.price = new_price;
                entry.order.original_qty = new_qty;
                entry.order.leaves_qty = new_qty - entry.order.filled_qty;
                entry.order.state = OrderState::PendingModify;
                entry.order.updated_ns = now_ns;
                true
            }
            Some(_) | None => false,
        }
    }

    /// Apply a gateway-reported transition. Unknown ids are discarded and
    /// reported via the return value.
    pub fn on_order_update(
        &mut self,
        order_id: OrderId,
        new_state: OrderState,
        filled_delta: Qty,
        leaves_qty: Qty,
        now_ns: Nanos,
    ) -> bool {
        let Some(entry) = self.entry_mut(order_id) else {
            tracing::debug!(order_id, "update for unknown order discarded");
            return false;
        };

        entry.order.filled_qty += filled_delta;
        entry.order.leaves_qty = leaves_qty;
        entry.order.state = new_state;
        entry.order.updated_ns = now_ns;

        if new_state.is_terminal() {
            // The terminal event has been applied; the slot is free for
            // the next id that wraps onto it.
            entry.active = false;
        }
        true
    }

    /// Read one order by id.
    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.entry(order_id).map(|e| &e.order)
    }

    /// Collect ids of active orders for `ticker` into `out`, returning how
    /// many were written.
    pub fn active_orders(&self, ticker: TickerId, out: &mut [OrderId]) -> usize {
        let mut count = 0;
        for entry in self.entries.iter() {
            if count == out.len() {
                break;
            }
            if entry.active && entry.order.ticker_id == ticker {
                out[count] = entry.order.order_id;
                count += 1;
            }
        }
        count
    }

    /// Number of active orders for `ticker` on one side.
    pub fn active_count(&self, ticker: TickerId, side: Side) -> usize {
        self.entries
            .iter()
            .filter(|e| e.active && e.order.ticker_id == ticker && e.order.side == side)
            .count()
    }

    /// Visit every active order for `ticker`.
    pub fn for_each_active<F: FnMut(&Order)>(&self, ticker: TickerId, mut f: F) {
        for entry in self.entries.iter() {
            if entry.active && entry.order.ticker_id == ticker {
                f(&entry.order);
            }
        }
    }

    /// Move every LIVE order of `ticker` to PENDING_CANCEL. Returns ids of
    /// the orders transitioned, written into `out`.
    pub fn cancel_all(&mut self, ticker: TickerId, now_ns: Nanos, out: &mut [OrderId]) -> usize {
        let mut count = 0;
        for entry in self.entries.iter_mut() {
            if count == out.len() {
                break;
            }
            if entry.active
                && entry.order.ticker_id == ticker
                && entry.order.state == OrderState::Live
            {
                entry.order.state = OrderState::PendingCancel;
                entry.order.updated_ns = now_ns;
                out[count] = entry.order.order_id;
                count += 1;
            }
        }
        count
    }

    /// Reprice LIVE orders so buys sit at or below `bid` and sells at or
    /// above `ask`, clipping outstanding leaves at `clip`. Each touched
    /// order transitions to PENDING_MODIFY and its new terms are written
    /// into `out` for the caller to forward to the venue.
    pub fn move_orders(
        &mut self,
        ticker: TickerId,
        bid: Price,
        ask: Price,
        clip: Qty,
        now_ns: Nanos,
        out: &mut [Repricing],
    ) -> usize {
        let mut count = 0;
        for entry in self.entries.iter_mut() {
            if count == out.len() {
                break;
            }
            if !entry.active
                || entry.order.ticker_id != ticker
                || entry.order.state != OrderState::Live
            {
                continue;
            }

            let order = &mut entry.order;
            let target_price = match order.side {
                Side::Buy if order.price > bid => Some(bid),
                Side::Sell if order.price < ask => Some(ask),
                _ => None,
            };
            let target_leaves = order.leaves_qty.min(clip);
            let resize = target_leaves != order.leaves_qty;

            if target_price.is_none() && !resize {
                continue;
            }

            let new_price = target_price.unwrap_or(order.price);
            let new_qty = order.filled_qty + target_leaves;

            order.price = new_price;
            order.original_qty = new_qty;
            order.leaves_qty = target_leaves;
            order.state = OrderState::PendingModify;
            order.updated_ns = now_ns;

            out[count] = Repricing {
                order_id: order.order_id,
                ticker_id: ticker,
                side: order.side,
                price: new_price,
                qty: new_qty,
            };
            count += 1;
        }
        count
    }

    /// Total active orders across all tickers.
    pub fn active_total(&self) -> usize {
        self.entries.iter().filter(|e| e.active).count()
    }
}
