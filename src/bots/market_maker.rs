//! HFT market maker archetype ("Citadels" in the roster).
//!
//! Toxicity-widened spread around a skewed reservation price, symmetric
//! two-sided quoting, no IOC orders.

use rand_chacha::ChaCha8Rng;

use super::{Bot, BotConfig, BotContext, BotDecision, BotRuntime};

pub struct HftMarketMaker {
    cfg: BotConfig,
    rt: BotRuntime,
}

impl HftMarketMaker {
    pub fn new(cfg: BotConfig) -> Self {
        Self { cfg, rt: BotRuntime::default() }
    }
}

impl Bot for HftMarketMaker {
    fn name(&self) -> &str {
        &self.cfg.name
    }

    fn config(&self) -> &BotConfig {
        &self.cfg
    }

    fn runtime(&mut self) -> &mut BotRuntime {
        &mut self.rt
    }

    fn decide(&mut self, ctx: &BotContext, _rng: &mut ChaCha8Rng) -> BotDecision {
        let vol = ctx.volatility.max(0.25);
        let tox = ctx.user_toxicity.abs() * 0.7 + ctx.own_toxicity.abs() * 0.3;
        let tox_mult = 1.0 + self.cfg.toxicity_sensitivity * tox.max(0.0) * 0.12;
        let spread = ((0.9 + 1.2 * vol) * tox_mult).clamp(0.8, 5.0);

        let inv = ctx.position as f64 / ctx.position_limit.max(1) as f64;
        let reservation =
            ctx.fair_value - (self.cfg.inventory_skew * self.cfg.risk_aversion * inv * vol.powi(2)) * 0.8;

        let snapped_bid = ctx.book.snap_price(reservation - spread / 2.0);
        let mut snapped_ask = ctx.book.snap_price(reservation + spread / 2.0);
        if snapped_bid >= snapped_ask {
            snapped_ask = ctx.book.snap_price(snapped_bid + ctx.book.tick_size);
        }
        let mut bid = Some(snapped_bid);
        let mut ask = Some(snapped_ask);

        if ctx.position >= ctx.position_limit {
            bid = None;
        }
        if ctx.position <= -ctx.position_limit {
            ask = None;
        }

        BotDecision { bid, ask, ioc_orders: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::OrderBook;

    fn config() -> BotConfig {
        BotConfig {
            name: "MM_Citadel_0".into(),
            base_latency: 0.10,
            quote_size: 1,
            aggression: 0.10,
            risk_aversion: 0.70,
            inventory_skew: 1.1,
            toxicity_sensitivity: 1.4,
            refresh_min_s: 0.18,
            stickiness_ticks: 1,
        }
    }

    #[test]
    fn quotes_straddle_fair_value_when_flat() {
        let book = OrderBook::new(0.1, 5.0);
        let mut bot = HftMarketMaker::new(config());
        let ctx = BotContext {
            now: 0.0,
            book: &book,
            tape: &[],
            position: 0,
            position_limit: 2,
            fair_value: 40.5,
            volatility: 1.0,
            user_toxicity: 0.0,
            own_toxicity: 0.0,
        };
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
        use rand::SeedableRng;
        let decision = bot.decide(&ctx, &mut rng);
        let bid = decision.bid.unwrap();
        let ask = decision.ask.unwrap();
        assert!(bid < 40.5 && ask > 40.5);
    }

    #[test]
    fn bid_and_ask_never_cross_even_when_snapping_collapses_the_spread() {
        // A coarse tick grid (3.0) can round both sides of a narrow spread
        // onto the same price; the anti-crossing guard must push ask clear.
        let book = OrderBook::new(3.0, 5.0);
        let mut bot = HftMarketMaker::new(config());
        let ctx = BotContext {
            now: 0.0,
            book: &book,
            tape: &[],
            position: 0,
            position_limit: 2,
            fair_value: 45.0,
            volatility: 0.25,
            user_toxicity: 0.0,
            own_toxicity: 0.0,
        };
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
        let decision = bot.decide(&ctx, &mut rng);
        let bid = decision.bid.unwrap();
        let ask = decision.ask.unwrap();
        assert!(bid < ask, "bid {bid} must be strictly less than ask {ask}");
        assert_eq!((bid, ask), (45.0, 48.0));
    }

    #[test]
    fn suppresses_bid_at_long_limit() {
        let book = OrderBook::new(0.1, 5.0);
        let mut bot = HftMarketMaker::new(config());
        let ctx = BotContext {
            now: 0.0,
            book: &book,
            tape: &[],
            position: 2,
            position_limit: 2,
            fair_value: 40.5,
            volatility: 1.0,
            user_toxicity: 0.0,
            own_toxicity: 0.0,
        };
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
        let decision = bot.decide(&ctx, &mut rng);
        assert!(decision.bid.is_none());
        assert!(decision.ask.is_some());
    }
}
