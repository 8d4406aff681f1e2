//! Central limit order book: price-level aggregation with FIFO queues and
//! order-id / trader-id indexes.
//!
//! Storage and crossing logic are separate components: this file owns the
//! book, [`crate::matching`] owns the crossing loop.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::trace;

use crate::error::OrderBookError;
use crate::types::{Order, OrderId, Price, Quantity, Side, Timestamp};

/// Ticks are the book's internal price representation: integer multiples of
/// `tick_size`, which keeps level keys exact instead of hashing/ordering raw
/// floats.
pub type PriceTicks = u64;

fn price_to_ticks(price: Price, tick_size: f64) -> PriceTicks {
    (price / tick_size).round() as PriceTicks
}

fn ticks_to_price(ticks: PriceTicks, tick_size: f64) -> Price {
    ticks as f64 * tick_size
}

#[derive(Debug, Default)]
struct PriceLevel {
    orders: VecDeque<Order>,
    total_quantity: Quantity,
}

impl PriceLevel {
    fn push_back(&mut self, order: Order) {
        self.total_quantity += order.quantity;
        self.orders.push_back(order);
    }

    fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Location of a live order, for O(1) cancel.
#[derive(Clone, Copy)]
struct OrderLocation {
    side: Side,
    ticks: PriceTicks,
}

pub struct OrderBook {
    pub tick_size: f64,
    /// Orders older than `quote_lifetime` seconds are removed by `expire`.
    /// Zero disables expiry.
    pub quote_lifetime: Timestamp,

    bids: BTreeMap<PriceTicks, PriceLevel>,
    asks: BTreeMap<PriceTicks, PriceLevel>,

    by_order_id: HashMap<OrderId, OrderLocation>,
    by_trader: HashMap<String, HashSet<OrderId>>,

    next_order_id: OrderId,

    total_orders_added: u64,
    total_orders_canceled: u64,
    total_orders_expired: u64,
}

impl OrderBook {
    pub fn new(tick_size: f64, quote_lifetime: Timestamp) -> Self {
        Self {
            tick_size,
            quote_lifetime,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            by_order_id: HashMap::new(),
            by_trader: HashMap::new(),
            next_order_id: 1,
            total_orders_added: 0,
            total_orders_canceled: 0,
            total_orders_expired: 0,
        }
    }

    pub fn snap_price(&self, price: Price) -> Price {
        ticks_to_price(price_to_ticks(price, self.tick_size), self.tick_size)
    }

    fn levels(&self, side: Side) -> &BTreeMap<PriceTicks, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<PriceTicks, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Insert a new order. Returns the assigned order id.
    pub fn add(
        &mut self,
        trader_id: impl Into<String>,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: Timestamp,
    ) -> Result<OrderId, OrderBookError> {
        let trader_id = trader_id.into();
        if trader_id.is_empty() {
            return Err(OrderBookError::EmptyTraderId);
        }
        if price <= 0.0 {
            return Err(OrderBookError::NonPositivePrice { price });
        }
        if quantity <= 0 {
            return Err(OrderBookError::NonPositiveQuantity { quantity });
        }
        if timestamp < 0.0 {
            return Err(OrderBookError::NegativeTimestamp { timestamp });
        }

        let price = self.snap_price(price);
        let ticks = price_to_ticks(price, self.tick_size);
        let order_id = self.next_order_id;
        self.next_order_id += 1;

        let order = Order {
            order_id,
            trader_id: trader_id.clone(),
            side,
            price,
            quantity,
            timestamp,
        };

        self.levels_mut(side).entry(ticks).or_default().push_back(order);
        self.by_order_id.insert(order_id, OrderLocation { side, ticks });
        self.by_trader.entry(trader_id).or_default().insert(order_id);
        self.total_orders_added += 1;

        trace!(order_id, ?side, price, quantity, "order added");
        Ok(order_id)
    }

    fn index_remove(&mut self, order_id: OrderId) {
        if let Some(loc) = self.by_order_id.remove(&order_id) {
            // trader index entries are cleaned up by the caller, which knows
            // the trader_id already; nothing further to do here for levels.
            let _ = loc;
        }
    }

    fn untrack_trader(&mut self, trader_id: &str, order_id: OrderId) {
        if let Some(set) = self.by_trader.get_mut(trader_id) {
            set.remove(&order_id);
            if set.is_empty() {
                self.by_trader.remove(trader_id);
            }
        }
    }

    pub fn cancel_by_id(&mut self, order_id: OrderId) -> bool {
        let Some(loc) = self.by_order_id.get(&order_id).copied() else {
            return false;
        };
        let levels = self.levels_mut(loc.side);
        let Some(level) = levels.get_mut(&loc.ticks) else {
            self.index_remove(order_id);
            return false;
        };

        let mut removed_trader = None;
        if let Some(pos) = level.orders.iter().position(|o| o.order_id == order_id) {
            let order = level.orders.remove(pos).unwrap();
            level.total_quantity -= order.quantity;
            removed_trader = Some(order.trader_id);
        }

        if level.is_empty() {
            levels.remove(&loc.ticks);
        }

        self.index_remove(order_id);
        if let Some(trader_id) = removed_trader {
            self.untrack_trader(&trader_id, order_id);
            self.total_orders_canceled += 1;
            true
        } else {
            false
        }
    }

    /// Cancel every order for `trader_id`, optionally restricted to one side.
    /// Returns the number of orders removed.
    pub fn cancel_by_trader(&mut self, trader_id: &str, side: Option<Side>) -> usize {
        let Some(ids) = self.by_trader.get(trader_id).cloned() else {
            return 0;
        };

        let mut canceled = 0;
        for order_id in ids {
            let Some(loc) = self.by_order_id.get(&order_id).copied() else {
                continue;
            };
            if let Some(s) = side {
                if loc.side != s {
                    continue;
                }
            }
            if self.cancel_by_id(order_id) {
                canceled += 1;
            }
        }
        canceled
    }

    /// Remove every order with `timestamp < now - quote_lifetime`. Disabled
    /// when `quote_lifetime <= 0`.
    pub fn expire(&mut self, now: Timestamp) -> usize {
        if self.quote_lifetime <= 0.0 {
            return 0;
        }
        let cutoff = now - self.quote_lifetime;

        let mut stale = Vec::new();
        for level in self.bids.values().chain(self.asks.values()) {
            for order in &level.orders {
                if order.timestamp < cutoff {
                    stale.push(order.order_id);
                }
            }
        }

        for order_id in &stale {
            self.cancel_by_id(*order_id);
        }
        self.total_orders_expired += stale.len() as u64;
        stale.len()
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().map(|&t| ticks_to_price(t, self.tick_size))
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().map(|&t| ticks_to_price(t, self.tick_size))
    }

    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        }
    }

    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(b), Some(a)) if b >= a)
    }

    /// Top-`levels` aggregated depth: bids descending, asks ascending.
    pub fn depth(&self, levels: usize) -> (Vec<(Price, Quantity)>, Vec<(Price, Quantity)>) {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(levels)
            .map(|(&t, lvl)| (ticks_to_price(t, self.tick_size), lvl.total_quantity))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(levels)
            .map(|(&t, lvl)| (ticks_to_price(t, self.tick_size), lvl.total_quantity))
            .collect();
        (bids, asks)
    }

    pub fn total_quantity(&self, side: Side) -> Quantity {
        self.levels(side).values().map(|lvl| lvl.total_quantity).sum()
    }

    pub fn orders_by_trader(&self, trader_id: &str) -> Vec<Order> {
        let Some(ids) = self.by_trader.get(trader_id) else {
            return Vec::new();
        };
        let mut out: Vec<Order> = ids
            .iter()
            .filter_map(|id| {
                let loc = self.by_order_id.get(id)?;
                let level = self.levels(loc.side).get(&loc.ticks)?;
                level.orders.iter().find(|o| o.order_id == *id).cloned()
            })
            .collect();
        out.sort_by_key(|o| o.priority_key());
        out
    }

    pub fn stats(&self) -> OrderBookStats {
        OrderBookStats {
            total_orders_added: self.total_orders_added,
            total_orders_canceled: self.total_orders_canceled,
            total_orders_expired: self.total_orders_expired,
            active_bid_levels: self.bids.len(),
            active_ask_levels: self.asks.len(),
        }
    }

    // -- crate-internal access for the matching engine --

    pub(crate) fn best_ticks(&self, side: Side) -> Option<PriceTicks> {
        match side {
            Side::Buy => self.bids.keys().next_back().copied(),
            Side::Sell => self.asks.keys().next().copied(),
        }
    }

    pub(crate) fn front(&self, side: Side, ticks: PriceTicks) -> Option<&Order> {
        self.levels(side).get(&ticks).and_then(|lvl| lvl.orders.front())
    }

    /// Reduce the front order of `(side, ticks)` by `qty`, removing it (and
    /// pruning the level, if now empty) when it reaches zero. Returns true
    /// if the front order was fully removed.
    pub(crate) fn reduce_front(&mut self, side: Side, ticks: PriceTicks, qty: Quantity) -> bool {
        let levels = self.levels_mut(side);
        let Some(level) = levels.get_mut(&ticks) else {
            return false;
        };
        let mut fully_removed = false;
        let mut removed_order_id = None;
        let mut removed_trader = None;
        if let Some(front) = level.orders.front_mut() {
            front.quantity -= qty;
            level.total_quantity -= qty;
            if front.quantity <= 0 {
                removed_order_id = Some(front.order_id);
                removed_trader = Some(front.trader_id.clone());
                level.orders.pop_front();
                fully_removed = true;
            }
        }
        if level.is_empty() {
            levels.remove(&ticks);
        }
        if let Some(order_id) = removed_order_id {
            self.index_remove(order_id);
            if let Some(trader_id) = removed_trader {
                self.untrack_trader(&trader_id, order_id);
            }
        }
        fully_removed
    }

    /// Pop and drop the front order of `(side, ticks)` unconditionally
    /// (used for self-trade prevention).
    pub(crate) fn pop_front(&mut self, side: Side, ticks: PriceTicks) -> Option<Order> {
        let levels = self.levels_mut(side);
        let level = levels.get_mut(&ticks)?;
        let order = level.orders.pop_front()?;
        level.total_quantity -= order.quantity;
        if level.is_empty() {
            levels.remove(&ticks);
        }
        self.index_remove(order.order_id);
        self.untrack_trader(&order.trader_id, order.order_id);
        Some(order)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderBookStats {
    pub total_orders_added: u64,
    pub total_orders_canceled: u64,
    pub total_orders_expired: u64,
    pub active_bid_levels: usize,
    pub active_ask_levels: usize,
}
