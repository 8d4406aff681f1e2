//! Property-based tests for order book, matching, and ledger invariants.

use pitwall::book::OrderBook;
use pitwall::ledger::Trader;
use pitwall::matching::MatchingEngine;
use pitwall::types::{Fill, Side};
use proptest::prelude::*;

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn price_strategy() -> impl Strategy<Value = f64> {
    (1i64..=2_000i64).prop_map(|ticks| ticks as f64 * 0.1)
}

fn quantity_strategy() -> impl Strategy<Value = i64> {
    1i64..=50
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Resting orders never leave the book crossed, before or after a match
    /// pass drains whatever did cross.
    #[test]
    fn book_never_crossed_after_match(
        orders in prop::collection::vec((side_strategy(), price_strategy(), quantity_strategy()), 1..40)
    ) {
        let mut book = OrderBook::new(0.1, 0.0);
        for (i, (side, price, qty)) in orders.into_iter().enumerate() {
            let _ = book.add(format!("T{i}"), side, price, qty, i as f64);
        }
        let mut engine = MatchingEngine::new();
        engine.match_orders(&mut book, 1000.0);

        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            prop_assert!(bid < ask, "crossed book survived matching: bid {bid} >= ask {ask}");
        }
    }

    /// Every match event has a distinct buyer and seller: self-trades never
    /// reach the event stream.
    #[test]
    fn no_self_trades_in_match_events(
        orders in prop::collection::vec((side_strategy(), price_strategy(), quantity_strategy(), 0usize..4), 1..40)
    ) {
        let mut book = OrderBook::new(0.1, 0.0);
        for (i, (side, price, qty, trader_idx)) in orders.into_iter().enumerate() {
            let _ = book.add(format!("T{trader_idx}"), side, price, qty, i as f64);
        }
        let mut engine = MatchingEngine::new();
        let events = engine.match_orders(&mut book, 1000.0);
        for event in &events {
            prop_assert_ne!(&event.buyer_id, &event.seller_id);
        }
    }

    /// Matching is deterministic: replaying identical order arrivals onto a
    /// fresh book produces byte-identical match event sequences.
    #[test]
    fn matching_is_deterministic(
        orders in prop::collection::vec((side_strategy(), price_strategy(), quantity_strategy()), 1..40)
    ) {
        let build = |orders: &[(Side, f64, i64)]| {
            let mut book = OrderBook::new(0.1, 0.0);
            for (i, (side, price, qty)) in orders.iter().enumerate() {
                let _ = book.add(format!("T{i}"), *side, *price, *qty, i as f64);
            }
            book
        };
        let mut book1 = build(&orders);
        let mut book2 = build(&orders);
        let events1 = MatchingEngine::new().match_orders(&mut book1, 5.0);
        let events2 = MatchingEngine::new().match_orders(&mut book2, 5.0);

        prop_assert_eq!(events1.len(), events2.len());
        for (a, b) in events1.iter().zip(events2.iter()) {
            prop_assert_eq!(a.price, b.price);
            prop_assert_eq!(a.quantity, b.quantity);
            prop_assert_eq!(&a.buyer_id, &b.buyer_id);
            prop_assert_eq!(&a.seller_id, &b.seller_id);
        }
    }

    /// Snapping a price to the tick grid is idempotent.
    #[test]
    fn price_snap_is_idempotent(raw in 0.01f64..10_000.0) {
        let book = OrderBook::new(0.1, 0.0);
        let once = book.snap_price(raw);
        let twice = book.snap_price(once);
        prop_assert!((once - twice).abs() < 1e-9);
    }

    /// Canceling a live order by id removes exactly one order and leaves the
    /// remaining resting quantity at that price untouched.
    #[test]
    fn cancel_by_id_removes_exactly_one(qty_a in quantity_strategy(), qty_b in quantity_strategy()) {
        let mut book = OrderBook::new(0.1, 0.0);
        let id_a = book.add("T1", Side::Buy, 100.0, qty_a, 0.0).unwrap();
        book.add("T1", Side::Buy, 100.0, qty_b, 1.0).unwrap();

        prop_assert!(book.cancel_by_id(id_a));
        prop_assert!(!book.cancel_by_id(id_a));
        prop_assert_eq!(book.total_quantity(Side::Buy), qty_b);
    }

    /// A trader's position and cash always equal the signed sum of their
    /// fills' quantities and notionals, net of fees, no matter the sequence.
    #[test]
    fn ledger_position_and_cash_match_fill_sums(
        fills in prop::collection::vec((side_strategy(), price_strategy(), quantity_strategy()), 0..40)
    ) {
        let mut trader = Trader::new("T1", false);
        let mut expected_position = 0i64;
        let mut expected_cash = 0.0f64;

        for (side, price, qty) in fills {
            trader.apply_fill(Fill {
                price,
                quantity: qty,
                side,
                timestamp: 0.0,
                counterparty_id: None,
                fee: 0.0,
            });
            match side {
                Side::Buy => {
                    expected_position += qty;
                    expected_cash -= price * qty as f64;
                }
                Side::Sell => {
                    expected_position -= qty;
                    expected_cash += price * qty as f64;
                }
            }
        }

        prop_assert_eq!(trader.position(), expected_position);
        prop_assert!((trader.cash() - expected_cash).abs() < 1e-6);
    }

    /// Pre-trade risk at the position limit: once |position| hits the limit,
    /// no further order in the same direction validates.
    #[test]
    fn risk_blocks_further_increase_at_position_limit(limit in 1i64..10, extra_qty in quantity_strategy()) {
        use pitwall::risk::RiskManager;

        let mut risk = RiskManager::new(limit, 1_000, -500.0, -1000.0, 1.0, 0.1);
        let mut trader = Trader::new("T1", false);
        trader.apply_fill(Fill {
            price: 100.0,
            quantity: limit,
            side: Side::Buy,
            timestamp: 0.0,
            counterparty_id: None,
            fee: 0.0,
        });

        prop_assert!(risk.validate(&trader, Side::Buy, extra_qty, 100.0).is_err());
        prop_assert!(risk.validate(&trader, Side::Sell, extra_qty, 100.0).is_ok());
    }
}
