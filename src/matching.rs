//! Price-time priority matching engine.
//!
//! Book storage lives in [`crate::book::OrderBook`]; this module owns only
//! the crossing loop. Self-trade prevention drops the newer (taker) side of
//! a same-trader cross and retries the match.

use tracing::{debug, trace};

use crate::book::OrderBook;
use crate::types::{MatchEvent, MatchId, Side, Timestamp};

pub struct MatchingEngine {
    next_match_id: MatchId,
    total_matches: u64,
    total_volume: f64,
    self_trades_prevented: u64,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            next_match_id: 1,
            total_matches: 0,
            total_volume: 0.0,
            self_trades_prevented: 0,
        }
    }

    pub fn stats(&self) -> MatchingStats {
        MatchingStats {
            total_matches: self.total_matches,
            total_volume: self.total_volume,
            self_trades_prevented: self.self_trades_prevented,
        }
    }

    /// Drain all crossings in `book` until the spread is non-negative or one
    /// side is empty. Deterministic for a fixed book state and `now`.
    pub fn match_orders(&mut self, book: &mut OrderBook, now: Timestamp) -> Vec<MatchEvent> {
        let mut events = Vec::new();

        loop {
            let Some(bid_ticks) = book.best_ticks(Side::Buy) else {
                break;
            };
            let Some(ask_ticks) = book.best_ticks(Side::Sell) else {
                break;
            };
            if bid_ticks < ask_ticks {
                break;
            }

            let (bid_key, bid_trader) = {
                let bid = book.front(Side::Buy, bid_ticks).expect("bid level non-empty");
                (bid.priority_key(), bid.trader_id.clone())
            };
            let (ask_key, ask_trader) = {
                let ask = book.front(Side::Sell, ask_ticks).expect("ask level non-empty");
                (ask.priority_key(), ask.trader_id.clone())
            };

            // Self-trade prevention: drop the newer (taker) side and retry.
            if bid_trader == ask_trader {
                if bid_key <= ask_key {
                    book.pop_front(Side::Sell, ask_ticks);
                } else {
                    book.pop_front(Side::Buy, bid_ticks);
                }
                self.self_trades_prevented += 1;
                continue;
            }

            // Older order is maker; execution price is the maker's price.
            let (execution_price, taker_id) = if bid_key <= ask_key {
                let bid_price = book.front(Side::Buy, bid_ticks).unwrap().price;
                (bid_price, ask_trader.clone())
            } else {
                let ask_price = book.front(Side::Sell, ask_ticks).unwrap().price;
                (ask_price, bid_trader.clone())
            };

            let bid_qty = book.front(Side::Buy, bid_ticks).unwrap().quantity;
            let ask_qty = book.front(Side::Sell, ask_ticks).unwrap().quantity;
            let match_qty = bid_qty.min(ask_qty);

            let match_id = self.next_match_id;
            self.next_match_id += 1;

            let event = MatchEvent {
                match_id,
                buyer_id: bid_trader,
                seller_id: ask_trader,
                price: execution_price,
                quantity: match_qty,
                taker_id,
                timestamp: now,
            };

            trace!(
                match_id,
                price = execution_price,
                quantity = match_qty,
                "match"
            );

            book.reduce_front(Side::Buy, bid_ticks, match_qty);
            book.reduce_front(Side::Sell, ask_ticks, match_qty);

            self.total_matches += 1;
            self.total_volume += match_qty as f64 * execution_price;
            events.push(event);
        }

        if !events.is_empty() {
            debug!(count = events.len(), "match_orders drained crossings");
        }
        events
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingStats {
    pub total_matches: u64,
    pub total_volume: f64,
    pub self_trades_prevented: u64,
}
