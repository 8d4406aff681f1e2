//! Shared primitive types used across the book, matching engine, ledger, and
//! bot ecosystem.

use serde::{Deserialize, Serialize};

/// Execution/quote price. Always a positive multiple of a book's tick size
/// once it has passed through [`crate::book::OrderBook::snap_price`].
pub type Price = f64;

/// Order/fill size, in whole lots.
pub type Quantity = i64;

/// Seconds since an arbitrary session epoch. The core never reads the wall
/// clock itself; callers supply `now` on every mutating call so that replay
/// and testing can drive time deterministically.
pub type Timestamp = f64;

/// Process-unique, monotonically increasing order identifier.
pub type OrderId = u64;

/// Process-unique, monotonically increasing match identifier.
pub type MatchId = u64;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for Buy, -1 for Sell. Useful for signed-quantity bookkeeping.
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

/// A resting or newly-submitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub trader_id: String,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: Timestamp,
}

impl Order {
    /// Key used for maker/taker determination and FIFO ordering:
    /// earlier timestamp wins; order_id breaks ties deterministically.
    pub fn priority_key(&self) -> (Timestamp, OrderId) {
        (self.timestamp, self.order_id)
    }
}

/// An immutable execution record. Fills are never mutated once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub price: Price,
    pub quantity: Quantity,
    pub side: Side,
    pub timestamp: Timestamp,
    pub counterparty_id: Option<String>,
    pub fee: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }

    /// Quantity with sign: positive for buy, negative for sell.
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * self.quantity
    }
}

/// A single crossing of the book. `buyer_id` and `seller_id` are always
/// distinct — the matching engine never emits a self-trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEvent {
    pub match_id: MatchId,
    pub buyer_id: String,
    pub seller_id: String,
    pub price: Price,
    pub quantity: Quantity,
    pub taker_id: String,
    pub timestamp: Timestamp,
}

impl MatchEvent {
    pub fn taker_side(&self) -> Side {
        if self.taker_id == self.buyer_id {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}

/// A single tape print, fed to bots as recent-trade context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePrint {
    pub timestamp: Timestamp,
    pub price: Price,
    pub quantity: Quantity,
    pub taker_side: Side,
}
