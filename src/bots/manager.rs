//! Bot roster construction and per-tick quoting.
//!
//! Roster counts, latency, and aggression are picked from the difficulty
//! name, and `update_quotes` drives every bot through latency gating, quote
//! (re)placement, and IOC submission, returning the IOC order ids so the
//! caller can cancel any unmatched remainder.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{Arbitrageur, Bot, BotConfig, BotContext, BotImpl, HftMarketMaker, MomentumTrader, NoiseTrader};
use crate::book::OrderBook;
use crate::config::DifficultyConfig;
use crate::error::RiskBlockReason;
use crate::ledger::Trader;
use crate::risk::RiskManager;
use crate::types::{OrderId, Side, Timestamp, TradePrint};

pub struct BotManager {
    bots: Vec<BotImpl>,
    rng: ChaCha8Rng,
}

impl BotManager {
    pub fn new(difficulty: &DifficultyConfig, seed: u64) -> Self {
        let (mm_count, mom_count, arb_count, noise_count, aggression) = match difficulty.name.as_str() {
            "EASY" => (2, 2, 1, 6, 0.25),
            "HARD" | "AXXELA" => (4, 4, 3, 10, 0.55),
            _ => (3, 3, 2, 8, 0.40),
        };
        let lat_mult = difficulty.bot_latency_mult;

        let mut bots: Vec<BotImpl> = Vec::new();
        for i in 0..mm_count {
            bots.push(BotImpl::MarketMaker(HftMarketMaker::new(BotConfig {
                name: format!("MM_Citadel_{i}"),
                base_latency: 0.10 * lat_mult,
                quote_size: 1,
                aggression: 0.10,
                risk_aversion: 0.70,
                inventory_skew: 1.1,
                toxicity_sensitivity: 1.4,
                refresh_min_s: 0.18,
                stickiness_ticks: 1,
            })));
        }
        for i in 0..mom_count {
            bots.push(BotImpl::Momentum(MomentumTrader::new(BotConfig {
                name: format!("Mom_Trend_{i}"),
                base_latency: 0.22 * lat_mult,
                quote_size: 1,
                aggression,
                risk_aversion: 0.25,
                inventory_skew: 0.4,
                toxicity_sensitivity: 0.6,
                refresh_min_s: 0.22,
                stickiness_ticks: 1,
            })));
        }
        for i in 0..arb_count {
            bots.push(BotImpl::Arbitrage(Arbitrageur::new(BotConfig {
                name: format!("Arb_Vulture_{i}"),
                base_latency: 0.14 * lat_mult,
                quote_size: 1,
                aggression: (aggression + 0.15).min(0.80),
                risk_aversion: 0.35,
                inventory_skew: 0.6,
                toxicity_sensitivity: 0.8,
                refresh_min_s: 0.20,
                stickiness_ticks: 1,
            })));
        }
        for i in 0..noise_count {
            bots.push(BotImpl::Noise(NoiseTrader::new(BotConfig {
                name: format!("Retail_{i}"),
                base_latency: 0.55 * lat_mult,
                quote_size: 1,
                aggression: 0.35,
                risk_aversion: 0.10,
                inventory_skew: 0.2,
                toxicity_sensitivity: 0.2,
                refresh_min_s: 0.30,
                stickiness_ticks: 2,
            })));
        }

        Self { bots, rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    /// Names of every bot in the roster, so the caller can pre-register a
    /// ledger [`Trader`] for each before the first tick.
    pub fn roster_ids(&self) -> Vec<String> {
        self.bots.iter().map(|b| b.name().to_string()).collect()
    }

    /// Drive every bot through one tick: latency gate, decide, (re)quote,
    /// and submit any IOC orders. Returns the order ids of IOC orders placed
    /// this tick, for the caller to cancel after matching runs.
    #[allow(clippy::too_many_arguments)]
    pub fn update_quotes(
        &mut self,
        book: &mut OrderBook,
        traders: &mut HashMap<String, Trader>,
        risk: &mut RiskManager,
        fair_value: f64,
        volatility: f64,
        user_toxicity: f64,
        tape: &[TradePrint],
        now: Timestamp,
    ) -> Vec<OrderId> {
        let mut ioc_ids = Vec::new();
        let position_limit = risk.position_limit;
        let tick_size = book.tick_size;

        for bot in self.bots.iter_mut() {
            // Base latency already folds in the difficulty latency multiplier
            // at roster-build time, so the runtime multiplier stays at 1.0.
            if !bot.latency_ready(now, 1.0, &mut self.rng) {
                continue;
            }

            let name = bot.name().to_string();
            let position = traders.get(&name).map(|t| t.position()).unwrap_or(0);
            let own_toxicity = traders.get(&name).map(|t| t.adverse_selection_score()).unwrap_or(0.0);

            let decision = {
                let ctx = BotContext {
                    now,
                    book,
                    tape,
                    position,
                    position_limit,
                    fair_value,
                    volatility,
                    user_toxicity,
                    own_toxicity,
                };
                bot.decide(&ctx, &mut self.rng)
            };

            if bot.should_refresh(tick_size, decision.bid, decision.ask, now) {
                book.cancel_by_trader(&name, None);
                let size = bot.config().quote_size;
                let total_depth = book.total_quantity(Side::Buy) + book.total_quantity(Side::Sell);

                if let Some(bid) = decision.bid {
                    let concentration_ok = total_depth == 0 || risk.check_concentration(size, total_depth).is_ok();
                    if risk.validate(traders.get(&name).unwrap(), Side::Buy, size, bid).is_ok() && concentration_ok {
                        let _ = book.add(name.clone(), Side::Buy, bid, size, now);
                    }
                }
                if let Some(ask) = decision.ask {
                    let concentration_ok = total_depth == 0 || risk.check_concentration(size, total_depth).is_ok();
                    if risk.validate(traders.get(&name).unwrap(), Side::Sell, size, ask).is_ok() && concentration_ok {
                        let _ = book.add(name.clone(), Side::Sell, ask, size, now);
                    }
                }
                bot.record_quote(decision.bid, decision.ask, now);
            }

            for (side, qty) in decision.ioc_orders {
                let Some(trader) = traders.get(&name) else { continue };
                if risk.validate(trader, side, qty, fair_value).is_err() {
                    continue;
                }
                let total_depth = book.total_quantity(Side::Buy) + book.total_quantity(Side::Sell);
                if total_depth != 0 && risk.check_concentration(qty, total_depth).is_err() {
                    continue;
                }
                let marketable = match side {
                    Side::Buy => book.best_ask().unwrap_or(fair_value),
                    Side::Sell => book.best_bid().unwrap_or(fair_value),
                };
                if let Ok(order_id) = book.add(name.clone(), side, marketable, qty, now) {
                    ioc_ids.push(order_id);
                }
            }
        }

        ioc_ids
    }

    /// Cancel whichever part of an IOC order did not match this tick.
    pub fn cancel_unmatched(&self, book: &mut OrderBook, ioc_ids: &[OrderId]) {
        for &id in ioc_ids {
            book.cancel_by_id(id);
        }
    }

    pub fn log_rejected(&self, risk: &RiskManager, trader_id: &str, reason: &RiskBlockReason) {
        risk.log_block(trader_id, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_sizes_scale_with_difficulty() {
        let easy = BotManager::new(&DifficultyConfig::easy(), 1);
        let hard = BotManager::new(&DifficultyConfig::hard(), 1);
        assert!(hard.roster_ids().len() > easy.roster_ids().len());
    }

    #[test]
    fn roster_names_are_unique() {
        let mgr = BotManager::new(&DifficultyConfig::medium(), 1);
        let ids = mgr.roster_ids();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(ids.len(), unique.len());
    }
}
