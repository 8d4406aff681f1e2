//! Pitwall: an educational market-making simulator.
//!
//! A central limit order book with price-time priority matching, an
//! event-sourced trader/position ledger, a risk-management layer, a
//! multi-strategy bot ecosystem, and a deterministic round-based tick loop,
//! wrapped up behind [`simulator::Simulator`].

pub mod analytics;
pub mod book;
pub mod bots;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod matching;
pub mod risk;
pub mod simulator;
pub mod types;

pub use config::DifficultyConfig;
pub use error::{OrderBookError, RiskBlockReason, SessionCommandError};
pub use events::{MarketEvent, MarketSnapshot};
pub use simulator::{create_session, GameState, Session, Simulator};
pub use types::{Fill, MatchEvent, Order, OrderId, Price, Quantity, Side, Timestamp, TradePrint};
