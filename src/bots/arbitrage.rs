//! Arbitrage ("Vulture") archetype.
//!
//! Fires an IOC whenever the visible mid strays from fair value by more than
//! a volatility-scaled edge; otherwise rests tight quotes around fair value.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::{Bot, BotConfig, BotContext, BotDecision, BotRuntime};
use crate::types::Side;

pub struct Arbitrageur {
    cfg: BotConfig,
    rt: BotRuntime,
}

impl Arbitrageur {
    pub fn new(cfg: BotConfig) -> Self {
        Self { cfg, rt: BotRuntime::default() }
    }
}

impl Bot for Arbitrageur {
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
        let Some(mid) = ctx.book.mid_price() else {
            return BotDecision::default();
        };

        let vol = ctx.volatility.max(0.25);
        let edge = (0.9 * vol).max(0.8);

        let mut ioc_orders = Vec::new();
        if mid < ctx.fair_value - edge && ctx.position < ctx.position_limit && rng.gen_range(0.0..1.0) < self.cfg.aggression {
            ioc_orders.push((Side::Buy, self.cfg.quote_size));
        } else if mid > ctx.fair_value + edge
            && ctx.position > -ctx.position_limit
            && rng.gen_range(0.0..1.0) < self.cfg.aggression
        {
            ioc_orders.push((Side::Sell, self.cfg.quote_size));
        }

        let spread = (1.0 + 0.7 * vol).clamp(1.0, 4.0);
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
