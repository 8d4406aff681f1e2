//! Pre-trade validation and real-time risk monitoring.
//!
//! `validate` runs a sequential pipeline (quantity/price sanity, max order
//! size, position limit) and rejects with a typed [`RiskBlockReason`].
//! Runtime monitors (`check_margin_call`, `check_loss_limit`, `var_95`) watch
//! marked-to-market exposure independently of order flow.

use tracing::{info, warn};

use crate::error::RiskBlockReason;
use crate::ledger::Trader;
use crate::types::{Price, Quantity, Side, Timestamp};

const LIQUIDATION_SLIPPAGE_TICKS: f64 = 5.0;
const VAR_Z_SCORE_95: f64 = 1.65;
const SECONDS_PER_DAY: f64 = 86_400.0;

pub struct RiskManager {
    pub position_limit: i64,
    pub max_order_size: Quantity,
    pub margin_threshold: f64,
    pub loss_limit: f64,
    pub concentration_limit: f64,
    pub tick_size: f64,

    total_blocks: u64,
    total_liquidations: u64,
}

impl RiskManager {
    pub fn new(
        position_limit: i64,
        max_order_size: Quantity,
        margin_threshold: f64,
        loss_limit: f64,
        concentration_limit: f64,
        tick_size: f64,
    ) -> Self {
        Self {
            position_limit,
            max_order_size,
            margin_threshold,
            loss_limit,
            concentration_limit,
            tick_size,
            total_blocks: 0,
            total_liquidations: 0,
        }
    }

    /// Full pre-trade validation: size, price, and prospective position.
    pub fn validate(
        &mut self,
        trader: &Trader,
        side: Side,
        quantity: Quantity,
        price: Price,
    ) -> Result<(), RiskBlockReason> {
        if quantity <= 0 {
            return Err(RiskBlockReason::NonPositiveQuantity { requested: quantity });
        }
        if price <= 0.0 {
            return Err(RiskBlockReason::NonPositivePrice { requested: price });
        }
        if quantity > self.max_order_size {
            self.total_blocks += 1;
            return Err(RiskBlockReason::OrderSize {
                requested: quantity,
                limit: self.max_order_size,
            });
        }

        let prospective = trader.position() + side.sign() * quantity;
        if prospective.abs() > self.position_limit {
            self.total_blocks += 1;
            return Err(RiskBlockReason::PositionLimit {
                prospective,
                limit: self.position_limit,
            });
        }

        Ok(())
    }

    /// Reject an order that would take more than `concentration_limit` of
    /// total visible book depth.
    pub fn check_concentration(
        &mut self,
        order_size: Quantity,
        total_book_depth: Quantity,
    ) -> Result<(), RiskBlockReason> {
        if total_book_depth <= 0 {
            return Err(RiskBlockReason::NoLiquidity);
        }
        let fraction = order_size as f64 / total_book_depth as f64;
        if fraction > self.concentration_limit {
            self.total_blocks += 1;
            return Err(RiskBlockReason::Concentration {
                fraction,
                limit: self.concentration_limit,
            });
        }
        Ok(())
    }

    /// Real-time margin-call check. If mark-to-market PnL falls below
    /// `margin_threshold`, forcibly flattens the position at a penalty
    /// price and returns true.
    pub fn check_margin_call(&mut self, trader: &mut Trader, fair_value: Price, now: Timestamp) -> bool {
        let pnl = trader.mark_to_market(fair_value);
        if pnl >= self.margin_threshold {
            return false;
        }

        let position = trader.position();
        if position == 0 {
            return false;
        }

        let slippage = LIQUIDATION_SLIPPAGE_TICKS;
        let liquidation_price = if position > 0 { fair_value - slippage } else { fair_value + slippage };

        trader.liquidate(liquidation_price);

        self.total_liquidations += 1;
        warn!(
            trader_id = %trader.trader_id,
            pnl,
            threshold = self.margin_threshold,
            timestamp = now,
            "margin call: position liquidated"
        );
        true
    }

    /// True when daily trading should halt for this trader (circuit
    /// breaker). Callers are responsible for enforcing the halt.
    pub fn check_loss_limit(&self, trader: &Trader, fair_value: Price) -> bool {
        trader.mark_to_market(fair_value) < self.loss_limit
    }

    /// Simplified 95% Value-at-Risk: position * std(recent fill prices) *
    /// 1.65 * sqrt(horizon / 1 day).
    pub fn var_95(&self, trader: &Trader, horizon_seconds: f64) -> f64 {
        if trader.num_fills() < 2 {
            return 0.0;
        }
        let recent: Vec<f64> = trader.fills().iter().rev().take(10).map(|f| f.price).collect();
        if recent.len() < 2 {
            return 0.0;
        }
        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        let variance = recent.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / recent.len() as f64;
        let volatility = variance.sqrt();

        trader.position().unsigned_abs() as f64 * volatility * VAR_Z_SCORE_95
            * (horizon_seconds / SECONDS_PER_DAY).sqrt()
    }

    pub fn risk_metrics(&self, trader: &Trader, mark: Price) -> RiskMetrics {
        let pnl = trader.mark_to_market(mark);
        let cushion = pnl - self.margin_threshold;
        let band = if self.margin_threshold != 0.0 {
            0.2 * self.margin_threshold.abs()
        } else {
            0.0
        };
        RiskMetrics {
            position_utilization: trader.position().unsigned_abs() as f64 / self.position_limit.max(1) as f64,
            mtm_pnl: pnl,
            margin_cushion: cushion,
            var_95: self.var_95(trader, 60.0),
            at_risk: cushion <= band,
        }
    }

    pub fn stats(&self) -> RiskManagerStats {
        RiskManagerStats {
            total_blocks: self.total_blocks,
            total_liquidations: self.total_liquidations,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskMetrics {
    pub position_utilization: f64,
    pub mtm_pnl: f64,
    pub margin_cushion: f64,
    pub var_95: f64,
    pub at_risk: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskManagerStats {
    pub total_blocks: u64,
    pub total_liquidations: u64,
}

impl RiskManager {
    pub fn log_block(&self, trader_id: &str, reason: &RiskBlockReason) {
        info!(trader_id, %reason, "order blocked by risk manager");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RiskManager {
        RiskManager::new(2, 10, -500.0, -1000.0, 0.5, 0.1)
    }

    #[test]
    fn blocks_orders_past_position_limit() {
        let mut rm = manager();
        let trader = Trader::new("T1", false);
        assert!(rm.validate(&trader, Side::Buy, 3, 100.0).is_ok());
        assert_eq!(
            rm.validate(&trader, Side::Buy, 3, 100.0).unwrap_err(),
            RiskBlockReason::PositionLimit { prospective: 3, limit: 2 }
        );
    }

    #[test]
    fn at_position_limit_no_further_increase_allowed() {
        let mut rm = manager();
        let mut trader = Trader::new("T1", false);
        trader.apply_fill(crate::types::Fill {
            price: 100.0,
            quantity: 2,
            side: Side::Buy,
            timestamp: 0.0,
            counterparty_id: None,
            fee: 0.0,
        });
        assert!(rm.validate(&trader, Side::Buy, 1, 100.0).is_err());
        assert!(rm.validate(&trader, Side::Sell, 1, 100.0).is_ok());
    }

    #[test]
    fn margin_call_flattens_and_matches_example() {
        let mut rm = RiskManager::new(100, 100, -50.0, -1000.0, 0.5, 0.1);
        let mut trader = Trader::new("T1", false);
        trader.apply_fill(crate::types::Fill {
            price: 100.0,
            quantity: 10,
            side: Side::Buy,
            timestamp: 0.0,
            counterparty_id: None,
            fee: 0.0,
        });

        assert!(rm.check_margin_call(&mut trader, 94.0, 0.0));
        assert_eq!(trader.position(), 0);
        assert!(!rm.check_margin_call(&mut trader, 94.0, 0.0));
    }

    #[test]
    fn concentration_check_rejects_large_orders() {
        let mut rm = manager();
        assert!(rm.check_concentration(60, 100).is_err());
        assert!(rm.check_concentration(40, 100).is_ok());
        assert!(rm.check_concentration(1, 0).is_err());
    }
}
