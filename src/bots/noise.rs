//! Noise ("Retail") archetype.
//!
//! A small flat chance of a random-direction IOC each tick, plus wide resting
//! quotes around fair value.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::{Bot, BotConfig, BotContext, BotDecision, BotRuntime};
use crate::types::Side;

const RANDOM_TRADE_CHANCE: f64 = 0.08;

pub struct NoiseTrader {
    cfg: BotConfig,
    rt: BotRuntime,
}

impl NoiseTrader {
    pub fn new(cfg: BotConfig) -> Self {
        Self { cfg, rt: BotRuntime::default() }
    }
}

impl Bot for NoiseTrader {
    fn name(&self) -> &str {
        &self.cfg.name
    }

    fn config(&self) -> &BotConfig {
        &self.cfg
    }

    fn runtime(&mut self) -> &mut BotRuntime {
        &mut self.rt
    }

    fn decide(&mut self, ctx: &BotContext, rng: &mut ChaCha8Rng) -> BotDecision {
        let vol = ctx.volatility.max(0.25);

        let mut ioc_orders = Vec::new();
        if rng.gen_range(0.0..1.0) < RANDOM_TRADE_CHANCE && rng.gen_range(0.0..1.0) < self.cfg.aggression {
            if rng.gen_range(0.0..1.0) < 0.5 && ctx.position < ctx.position_limit {
                ioc_orders.push((Side::Buy, self.cfg.quote_size));
            } else if ctx.position > -ctx.position_limit {
                ioc_orders.push((Side::Sell, self.cfg.quote_size));
            }
        }

        let spread = 3.5 + 0.8 * vol;
        let mut bid = Some(ctx.book.snap_price(ctx.fair_value - spread / 2.0));
        let mut ask = Some(ctx.book.snap_price(ctx.fair_value + spread / 2.0));
        if ctx.position >= ctx.position_limit {
            bid = None;
        }
        if ctx.position <= -ctx.position_limit {
            ask = None;
        }

        BotDecision { bid, ask, ioc_orders }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::OrderBook;
    use rand::SeedableRng;

    fn config() -> BotConfig {
        BotConfig {
            name: "Retail_0".into(),
            base_latency: 0.55,
            quote_size: 1,
            aggression: 0.35,
            risk_aversion: 0.10,
            inventory_skew: 0.2,
            toxicity_sensitivity: 0.2,
            refresh_min_s: 0.30,
            stickiness_ticks: 2,
        }
    }

    #[test]
    fn quotes_are_wide_around_fair_value() {
        let book = OrderBook::new(0.1, 5.0);
        let ctx = BotContext {
            now: 0.0,
            book: &book,
            tape: &[],
            position: 0,
            position_limit: 2,
            fair_value: 40.0,
            volatility: 1.0,
            user_toxicity: 0.0,
            own_toxicity: 0.0,
        };
        let mut bot = NoiseTrader::new(config());
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let decision = bot.decide(&ctx, &mut rng);
        let bid = decision.bid.unwrap();
        let ask = decision.ask.unwrap();
        assert!(ask - bid >= 3.5);
    }

    #[test]
    fn suppresses_ask_at_short_limit() {
        let book = OrderBook::new(0.1, 5.0);
        let ctx = BotContext {
            now: 0.0,
            book: &book,
            tape: &[],
            position: -2,
            position_limit: 2,
            fair_value: 40.0,
            volatility: 1.0,
            user_toxicity: 0.0,
            own_toxicity: 0.0,
        };
        let mut bot = NoiseTrader::new(config());
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let decision = bot.decide(&ctx, &mut rng);
        assert!(decision.ask.is_none());
        assert!(decision.bid.is_some());
    }
}
