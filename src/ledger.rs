//! Event-sourced trader/position ledger.
//!
//! `apply_fill` is the sole mutator: it tracks cost basis on open/close/flip
//! and folds each fill into a single adverse-selection EMA rather than a
//! per-horizon bucket set.

use crate::types::{Fill, Price, Quantity, Side};

const ADVERSE_SELECTION_ALPHA: f64 = 0.15;

/// Tracks one trader's position, cash, fees, and fill history. `apply_fill`
/// is the only method that mutates state.
pub struct Trader {
    pub trader_id: String,
    pub is_bot: bool,

    position: i64,
    cash: f64,
    fees_paid: f64,
    fills: Vec<Fill>,

    adverse_selection_score: f64,
}

impl Trader {
    pub fn new(trader_id: impl Into<String>, is_bot: bool) -> Self {
        Self {
            trader_id: trader_id.into(),
            is_bot,
            position: 0,
            cash: 0.0,
            fees_paid: 0.0,
            fills: Vec::new(),
            adverse_selection_score: 0.0,
        }
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn num_fills(&self) -> usize {
        self.fills.len()
    }

    pub fn adverse_selection_score(&self) -> f64 {
        self.adverse_selection_score
    }

    /// The only state mutator. Position and cash move in lockstep with the
    /// fill's signed quantity and notional; fees always reduce cash.
    pub fn apply_fill(&mut self, fill: Fill) {
        self.position += fill.signed_quantity();
        match fill.side {
            Side::Buy => self.cash -= fill.notional(),
            Side::Sell => self.cash += fill.notional(),
        }
        self.cash -= fill.fee;
        self.fees_paid += fill.fee;
        self.fills.push(fill);
    }

    /// cash + position * mark. Total PnL: realized + unrealized, net of fees.
    pub fn mark_to_market(&self, mark: Price) -> f64 {
        self.cash + self.position as f64 * mark
    }

    /// Force-flatten the position at `price` by adjusting cash directly,
    /// bypassing fill history. Used only for margin-call liquidation — this
    /// is a risk-management action, not a matched trade, so it must not
    /// create a [`Fill`] or touch `fills()`/the adverse-selection EMA.
    pub fn liquidate(&mut self, price: Price) {
        self.cash += price * self.position as f64;
        self.position = 0;
    }

    /// Volume-weighted average price across all fills, 0 when flat history.
    pub fn vwap(&self) -> f64 {
        if self.fills.is_empty() {
            return 0.0;
        }
        let total_value: f64 = self.fills.iter().map(|f| f.notional()).sum();
        let total_qty: i64 = self.fills.iter().map(|f| f.quantity).sum();
        if total_qty == 0 {
            0.0
        } else {
            total_value / total_qty as f64
        }
    }

    /// Average cost basis on the side matching the current position
    /// (long -> average buy price, short -> average sell price).
    pub fn average_cost(&self) -> f64 {
        if self.position > 0 {
            let (value, qty) = self.side_totals(Side::Buy);
            if qty > 0 { value / qty as f64 } else { 0.0 }
        } else if self.position < 0 {
            let (value, qty) = self.side_totals(Side::Sell);
            if qty > 0 { value / qty as f64 } else { 0.0 }
        } else {
            0.0
        }
    }

    fn side_totals(&self, side: Side) -> (f64, Quantity) {
        self.fills
            .iter()
            .filter(|f| f.side == side)
            .fold((0.0, 0), |(v, q), f| (v + f.notional(), q + f.quantity))
    }

    pub fn realized_pnl(&self, mark: Price) -> f64 {
        let total = self.mark_to_market(mark);
        let unrealized = self.position as f64 * (mark - self.average_cost());
        total - unrealized
    }

    /// Update the adverse-selection EMA from one fill's edge against fair
    /// value. Positive edge means the trader captured a favorable price.
    pub fn update_adverse_selection(&mut self, fill_price: Price, fair_value: f64, is_buyer: bool) {
        let edge = if is_buyer {
            fair_value - fill_price
        } else {
            fill_price - fair_value
        };
        self.adverse_selection_score =
            (1.0 - ADVERSE_SELECTION_ALPHA) * self.adverse_selection_score + ADVERSE_SELECTION_ALPHA * edge;
    }

    /// Clear all history and return to a fresh state.
    pub fn reset(&mut self) {
        self.position = 0;
        self.cash = 0.0;
        self.fees_paid = 0.0;
        self.fills.clear();
        self.adverse_selection_score = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(side: Side, price: f64, qty: i64, fee: f64) -> Fill {
        Fill {
            price,
            quantity: qty,
            side,
            timestamp: 0.0,
            counterparty_id: None,
            fee,
        }
    }

    #[test]
    fn apply_fill_updates_position_and_cash() {
        let mut t = Trader::new("T1", false);
        t.apply_fill(fill(Side::Buy, 100.0, 10, 0.0));
        assert_eq!(t.position(), 10);
        assert_eq!(t.cash(), -1000.0);
        assert_eq!(t.mark_to_market(94.0), -1000.0 + 940.0);
    }

    #[test]
    fn margin_call_scenario_matches_spec_example() {
        let mut t = Trader::new("T1", false);
        t.apply_fill(fill(Side::Buy, 100.0, 10, 0.0));
        let pnl = t.mark_to_market(94.0);
        assert!((pnl - (-60.0)).abs() < 1e-9);
    }

    #[test]
    fn vwap_and_fees_accumulate() {
        let mut t = Trader::new("T1", false);
        t.apply_fill(fill(Side::Buy, 100.0, 1, 1.0));
        t.apply_fill(fill(Side::Buy, 102.0, 1, 1.0));
        assert_eq!(t.vwap(), 101.0);
        assert_eq!(t.fees_paid(), 2.0);
        assert_eq!(t.cash(), -100.0 - 102.0 - 2.0);
    }

    #[test]
    fn reset_clears_history() {
        let mut t = Trader::new("T1", false);
        t.apply_fill(fill(Side::Buy, 100.0, 1, 0.0));
        t.reset();
        assert_eq!(t.position(), 0);
        assert_eq!(t.cash(), 0.0);
        assert_eq!(t.num_fills(), 0);
    }

    #[test]
    fn adverse_selection_ema_tracks_favorable_fills() {
        let mut t = Trader::new("T1", false);
        t.update_adverse_selection(99.0, 100.0, true);
        assert!(t.adverse_selection_score() > 0.0);
        t.update_adverse_selection(101.0, 100.0, false);
        assert!(t.adverse_selection_score() > 0.0);
    }

    #[test]
    fn liquidate_flattens_position_without_touching_fills() {
        let mut t = Trader::new("T1", false);
        t.apply_fill(fill(Side::Buy, 100.0, 10, 0.0));
        t.liquidate(89.0);
        assert_eq!(t.position(), 0);
        assert_eq!(t.cash(), -1000.0 + 890.0);
        assert_eq!(t.num_fills(), 1, "liquidation must not synthesize a Fill");
    }
}
