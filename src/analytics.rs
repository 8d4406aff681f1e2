//! Stateless reporting helpers over a [`Trader`] or the book. Never mutate
//! core state.

use crate::book::OrderBook;
use crate::ledger::Trader;
use crate::types::{Price, Quantity, Side};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FillSummary {
    pub count: usize,
    pub total_volume: Quantity,
    pub average_price: Price,
    pub gross_notional: f64,
}

pub fn fill_summary(trader: &Trader) -> FillSummary {
    let fills = trader.fills();
    if fills.is_empty() {
        return FillSummary::default();
    }
    let total_volume: Quantity = fills.iter().map(|f| f.quantity).sum();
    let gross_notional: f64 = fills.iter().map(|f| f.notional()).sum();
    FillSummary {
        count: fills.len(),
        total_volume,
        average_price: gross_notional / total_volume as f64,
        gross_notional,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdverseSelectionReport {
    pub score: f64,
    pub recent_edges: Vec<f64>,
}

/// `score` is the trader's live EMA; `recent_edges` recomputes the raw
/// per-fill edge against `fair_value` for the last `window` fills, purely
/// for display — it does not feed back into the EMA.
pub fn adverse_selection_report(trader: &Trader, fair_value: f64, window: usize) -> AdverseSelectionReport {
    let edges = trader
        .fills()
        .iter()
        .rev()
        .take(window)
        .map(|f| match f.side {
            Side::Buy => fair_value - f.price,
            Side::Sell => f.price - fair_value,
        })
        .collect::<Vec<_>>();
    AdverseSelectionReport { score: trader.adverse_selection_score(), recent_edges: edges }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub trader_id: String,
    pub mtm_pnl: f64,
}

/// Every trader's mark-to-market PnL at `mark`, sorted best-to-worst.
pub fn leaderboard<'a>(traders: impl IntoIterator<Item = &'a Trader>, mark: Price) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = traders
        .into_iter()
        .map(|t| LeaderboardEntry { trader_id: t.trader_id.clone(), mtm_pnl: t.mark_to_market(mark) })
        .collect();
    entries.sort_by(|a, b| b.mtm_pnl.partial_cmp(&a.mtm_pnl).unwrap());
    entries
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookDepthReport {
    pub bid_levels: Vec<(Price, Quantity, Quantity)>,
    pub ask_levels: Vec<(Price, Quantity, Quantity)>,
}

/// `depth(k)` reshaped with a running cumulative-quantity column, for
/// display.
pub fn book_depth_report(book: &OrderBook, levels: usize) -> BookDepthReport {
    let (bids, asks) = book.depth(levels);
    let with_cumulative = |rows: Vec<(Price, Quantity)>| {
        let mut running = 0;
        rows.into_iter()
            .map(|(price, qty)| {
                running += qty;
                (price, qty, running)
            })
            .collect()
    };
    BookDepthReport { bid_levels: with_cumulative(bids), ask_levels: with_cumulative(asks) }
}
