//! Error taxonomy for the simulator core.
//!
//! Input-validation and risk-rejection failures are modeled as plain enums
//! with a hand-written [`std::fmt::Display`] impl, not a derive-macro error
//! crate — this mirrors the failure taxonomy of the risk and order-book
//! layers this crate's structure is grounded on. Top-level session
//! operations that need to bubble up context (config loading, embedding
//! glue) use `anyhow::Result` instead of inventing a blanket error type.

use std::fmt;

use crate::types::{Price, Quantity};

/// Rejected at order construction, before the order ever reaches the book.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderBookError {
    EmptyTraderId,
    NonPositivePrice { price: Price },
    NonPositiveQuantity { quantity: Quantity },
    NegativeTimestamp { timestamp: f64 },
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::EmptyTraderId => write!(f, "trader_id cannot be empty"),
            OrderBookError::NonPositivePrice { price } => {
                write!(f, "price must be > 0, got {price}")
            }
            OrderBookError::NonPositiveQuantity { quantity } => {
                write!(f, "quantity must be > 0, got {quantity}")
            }
            OrderBookError::NegativeTimestamp { timestamp } => {
                write!(f, "timestamp must be >= 0, got {timestamp}")
            }
        }
    }
}

impl std::error::Error for OrderBookError {}

/// Pre-trade rejection from the risk manager. One variant per rule, each
/// carrying the offending value and the limit it tripped.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskBlockReason {
    NonPositiveQuantity { requested: Quantity },
    NonPositivePrice { requested: Price },
    OrderSize { requested: Quantity, limit: Quantity },
    PositionLimit { prospective: i64, limit: i64 },
    Concentration { fraction: f64, limit: f64 },
    NoLiquidity,
}

impl fmt::Display for RiskBlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskBlockReason::NonPositiveQuantity { requested } => {
                write!(f, "quantity must be > 0, got {requested}")
            }
            RiskBlockReason::NonPositivePrice { requested } => {
                write!(f, "price must be > 0, got {requested}")
            }
            RiskBlockReason::OrderSize { requested, limit } => {
                write!(f, "order size {requested} exceeds max {limit}")
            }
            RiskBlockReason::PositionLimit { prospective, limit } => {
                write!(
                    f,
                    "position limit ({limit}) would be exceeded (prospective {prospective})"
                )
            }
            RiskBlockReason::Concentration { fraction, limit } => {
                write!(
                    f,
                    "order represents {:.1}% of book depth, limit is {:.1}%",
                    fraction * 100.0,
                    limit * 100.0
                )
            }
            RiskBlockReason::NoLiquidity => write!(f, "no liquidity available"),
        }
    }
}

impl std::error::Error for RiskBlockReason {}

/// Precondition failures on the user-facing session commands. These are
/// no-ops, not panics: the caller gets a reason back and core state is
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommandError {
    WrongGameState { action: &'static str },
    CrossedQuote { bid: Price, ask: Price },
    NonPositiveQuantity { quantity: Quantity },
    NonPositivePrice { price: Price },
    InvalidRound { round: u32, total_rounds: u32 },
}

impl fmt::Display for SessionCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionCommandError::WrongGameState { action } => {
                write!(f, "cannot {action}: round is not active")
            }
            SessionCommandError::CrossedQuote { bid, ask } => {
                write!(f, "bid {bid} must be less than ask {ask}")
            }
            SessionCommandError::NonPositiveQuantity { quantity } => {
                write!(f, "quantity must be > 0, got {quantity}")
            }
            SessionCommandError::NonPositivePrice { price } => {
                write!(f, "price must be > 0, got {price}")
            }
            SessionCommandError::InvalidRound { round, total_rounds } => {
                write!(f, "invalid round {round}, session has {total_rounds} rounds")
            }
        }
    }
}

impl std::error::Error for SessionCommandError {}
