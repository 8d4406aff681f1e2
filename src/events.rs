//! Event/snapshot types and the pub-sub surface subscribers observe.
//!
//! `MarketEvent` is one tagged variant per kind, `serde`-derived for wire
//! transport; subscribers register closures against [`Subscribers`] and are
//! isolated from each other's panics.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{Price, Quantity, Side, Timestamp};

/// One notable occurrence during a session. Subscribers see these in the
/// exact order the core emitted them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    RoundStart { round: u32, timestamp: Timestamp },
    RoundEnd { round: u32, revealed_digit: u8, timestamp: Timestamp },
    DigitReveal { round: u32, digit: u8, timestamp: Timestamp },
    TradeExecuted {
        match_id: u64,
        price: Price,
        quantity: Quantity,
        taker_side: Side,
        timestamp: Timestamp,
    },
    PositionChange { trader_id: String, position: i64, timestamp: Timestamp },
    RiskAlert { trader_id: String, reason: String, timestamp: Timestamp },
    VolatilitySpike { volatility: f64, timestamp: Timestamp },
    LiquidityCrash { timestamp: Timestamp },
    MarginCall { trader_id: String, liquidation_price: Price, timestamp: Timestamp },
    Leaderboard { entries: Vec<(String, f64)>, timestamp: Timestamp },
}

/// Immutable point-in-time view of the whole session, handed to subscribers
/// and returned from `snapshot()`. Never mutated by its recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub timestamp: Timestamp,
    pub game_state: String,
    pub current_round: u32,
    pub total_rounds: u32,
    pub time_remaining: f64,

    pub fair_value: f64,
    pub theoretical_std: f64,
    pub volatility: f64,
    /// Revealed digits so far; `None` entries are still unknown.
    pub digits: Vec<Option<u8>>,

    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub spread: Option<Price>,
    pub mid_price: Option<Price>,
    pub bid_depth: Vec<(Price, Quantity)>,
    pub ask_depth: Vec<(Price, Quantity)>,

    pub user_position: i64,
    pub user_cash: f64,
    pub user_fees_paid: f64,
    pub user_mtm: f64,
    pub user_vwap: f64,
    pub user_toxicity: f64,

    pub risk_position_utilization: f64,
    pub risk_margin_cushion: f64,
    pub risk_var_95: f64,
    pub risk_at_risk: bool,

    pub recent_trades: Vec<String>,
    pub recent_alerts: Vec<String>,

    pub bot_positions: Vec<(String, i64, f64)>,
    pub leaderboard: Vec<(String, f64)>,
    pub settlement: Option<i64>,

    pub total_matches: u64,
    pub total_volume: f64,
}

impl MarketSnapshot {
    /// Serialize to the JSON wire format an embedding frontend polls.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a snapshot previously produced by [`MarketSnapshot::to_json`].
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

impl MarketEvent {
    /// Serialize to the JSON wire format an embedding frontend subscribes to.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub type EventCallback = Box<dyn Fn(&MarketEvent) + Send>;
pub type SnapshotCallback = Box<dyn Fn(&MarketSnapshot) + Send>;

/// Registration point for event/snapshot subscribers. A panicking callback
/// is caught and dropped; it never corrupts core state or blocks the other
/// subscribers in the same emission.
#[derive(Default)]
pub struct Subscribers {
    event_listeners: Vec<EventCallback>,
    state_listeners: Vec<SnapshotCallback>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_events(&mut self, cb: EventCallback) {
        self.event_listeners.push(cb);
    }

    pub fn subscribe_state(&mut self, cb: SnapshotCallback) {
        self.state_listeners.push(cb);
    }

    pub fn emit_event(&self, event: &MarketEvent) {
        for listener in &self.event_listeners {
            let result = catch_unwind(AssertUnwindSafe(|| listener(event)));
            if result.is_err() {
                warn!("event subscriber panicked; isolated and dropped");
            }
        }
    }

    pub fn emit_state(&self, snapshot: &MarketSnapshot) {
        for listener in &self.state_listeners {
            let result = catch_unwind(AssertUnwindSafe(|| listener(snapshot)));
            if result.is_err() {
                warn!("state subscriber panicked; isolated and dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn event_is_delivered_to_all_subscribers() {
        let mut subs = Subscribers::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            subs.subscribe_events(Box::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        subs.emit_event(&MarketEvent::RoundStart { round: 1, timestamp: 0.0 });
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let mut subs = Subscribers::new();
        let count = Arc::new(AtomicUsize::new(0));
        subs.subscribe_events(Box::new(|_| panic!("boom")));
        let after = count.clone();
        subs.subscribe_events(Box::new(move |_| {
            after.fetch_add(1, Ordering::SeqCst);
        }));
        subs.emit_event(&MarketEvent::RoundStart { round: 1, timestamp: 0.0 });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_json_round_trips_through_the_tagged_format() {
        let event = MarketEvent::VolatilitySpike { volatility: 2.1, timestamp: 3.5 };
        let json = event.to_json().unwrap();
        assert!(json.contains("\"type\":\"volatility_spike\""));
    }
}
