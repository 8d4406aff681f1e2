//! Multi-strategy bot ecosystem.
//!
//! Each archetype receives a read-only context (book, tape, own position,
//! fair value, volatility) and returns a decision — no direct order-sender
//! access. Shared latency/refresh/snap bookkeeping lives on the `Bot` trait's
//! default methods over a common [`BotRuntime`] + [`BotConfig`], composed
//! into each archetype rather than inherited.

mod arbitrage;
mod manager;
mod market_maker;
mod momentum;
mod noise;

pub use arbitrage::Arbitrageur;
pub use manager::BotManager;
pub use market_maker::HftMarketMaker;
pub use momentum::MomentumTrader;
pub use noise::NoiseTrader;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::book::OrderBook;
use crate::types::{Price, Quantity, Side, Timestamp, TradePrint};

/// Per-bot tuning, transcribed from one `BotConfig` preset in the roster
/// builder.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub name: String,
    pub base_latency: f64,
    pub quote_size: Quantity,
    pub aggression: f64,
    pub risk_aversion: f64,
    pub inventory_skew: f64,
    pub toxicity_sensitivity: f64,
    pub refresh_min_s: f64,
    pub stickiness_ticks: i64,
}

/// Mutable scheduling/quote-memory state shared by every archetype.
#[derive(Debug, Clone, Default)]
pub struct BotRuntime {
    next_action_time: Timestamp,
    last_quote_time: Timestamp,
    last_bid: Option<Price>,
    last_ask: Option<Price>,
}

/// Snapshot handed to a bot on each tick. Borrowed, never owned: bots never
/// hold a reference to the book or tape across ticks.
pub struct BotContext<'a> {
    pub now: Timestamp,
    pub book: &'a OrderBook,
    pub tape: &'a [TradePrint],
    pub position: i64,
    pub position_limit: i64,
    pub fair_value: f64,
    pub volatility: f64,
    pub user_toxicity: f64,
    pub own_toxicity: f64,
}

/// What a bot wants to do this tick: two resting quotes to (re)place, plus
/// any immediate-or-cancel marketable orders to send before the quotes.
#[derive(Debug, Clone, Default)]
pub struct BotDecision {
    pub bid: Option<Price>,
    pub ask: Option<Price>,
    pub ioc_orders: Vec<(Side, Quantity)>,
}

/// Shared behavior for every bot archetype. Archetypes only need to supply
/// `decide` and the two accessors; latency gating, refresh throttling, and
/// price snapping come from the default methods.
pub trait Bot {
    fn name(&self) -> &str;
    fn config(&self) -> &BotConfig;
    fn runtime(&mut self) -> &mut BotRuntime;

    /// True once per `base_latency` seconds (jittered ±25%, scaled by the
    /// difficulty's `bot_latency_mult`); false otherwise. Advances the
    /// internal cooldown as a side effect when it returns true.
    fn latency_ready(&mut self, now: Timestamp, latency_mult: f64, rng: &mut ChaCha8Rng) -> bool {
        let base = self.config().base_latency;
        let jitter = 0.25 * base;
        let runtime = self.runtime();
        if now < runtime.next_action_time {
            return false;
        }
        let wait = ((base + rng.gen_range(-jitter..=jitter)) * latency_mult).max(0.01);
        runtime.next_action_time = now + wait;
        true
    }

    /// Round a price to the book's tick grid.
    fn snap(&self, book: &OrderBook, price: Price) -> Price {
        book.snap_price(price)
    }

    /// Quote stickiness: only replace a resting quote once `refresh_min_s`
    /// has elapsed and the new price differs by at least `stickiness_ticks`.
    fn should_refresh(&mut self, tick_size: f64, bid: Option<Price>, ask: Option<Price>, now: Timestamp) -> bool {
        let cfg_refresh_min_s = self.config().refresh_min_s;
        let threshold = self.config().stickiness_ticks as f64 * tick_size;
        let runtime = self.runtime();
        if runtime.last_bid.is_none() && runtime.last_ask.is_none() {
            return true;
        }
        if now - runtime.last_quote_time < cfg_refresh_min_s {
            return false;
        }
        let moved = |prev: Option<Price>, next: Option<Price>| match (prev, next) {
            (Some(p), Some(n)) => (p - n).abs() >= threshold,
            (None, None) => false,
            _ => true,
        };
        moved(runtime.last_bid, bid) || moved(runtime.last_ask, ask)
    }

    fn record_quote(&mut self, bid: Option<Price>, ask: Option<Price>, now: Timestamp) {
        let runtime = self.runtime();
        runtime.last_bid = bid;
        runtime.last_ask = ask;
        runtime.last_quote_time = now;
    }

    /// Decide this tick's resting quotes and IOC orders. Implementations
    /// must respect `ctx.position_limit` themselves (suppress a quote/IOC
    /// that would breach it); the manager re-validates through the risk
    /// layer regardless.
    fn decide(&mut self, ctx: &BotContext, rng: &mut ChaCha8Rng) -> BotDecision;
}

fn new_runtime() -> BotRuntime {
    BotRuntime::default()
}

/// Closed set of archetypes, dispatched by tag rather than through a trait
/// object — the roster is fixed at construction and never grows a fifth
/// kind at runtime, so a `match` reads better than `dyn Bot`.
pub enum BotImpl {
    MarketMaker(HftMarketMaker),
    Momentum(MomentumTrader),
    Arbitrage(Arbitrageur),
    Noise(NoiseTrader),
}

impl Bot for BotImpl {
    fn name(&self) -> &str {
        match self {
            BotImpl::MarketMaker(b) => b.name(),
            BotImpl::Momentum(b) => b.name(),
            BotImpl::Arbitrage(b) => b.name(),
            BotImpl::Noise(b) => b.name(),
        }
    }

    fn config(&self) -> &BotConfig {
        match self {
            BotImpl::MarketMaker(b) => b.config(),
            BotImpl::Momentum(b) => b.config(),
            BotImpl::Arbitrage(b) => b.config(),
            BotImpl::Noise(b) => b.config(),
        }
    }

    fn runtime(&mut self) -> &mut BotRuntime {
        match self {
            BotImpl::MarketMaker(b) => b.runtime(),
            BotImpl::Momentum(b) => b.runtime(),
            BotImpl::Arbitrage(b) => b.runtime(),
            BotImpl::Noise(b) => b.runtime(),
        }
    }

    fn decide(&mut self, ctx: &BotContext, rng: &mut ChaCha8Rng) -> BotDecision {
        match self {
            BotImpl::MarketMaker(b) => b.decide(ctx, rng),
            BotImpl::Momentum(b) => b.decide(ctx, rng),
            BotImpl::Arbitrage(b) => b.decide(ctx, rng),
            BotImpl::Noise(b) => b.decide(ctx, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        cfg: BotConfig,
        rt: BotRuntime,
    }

    impl Bot for Dummy {
        fn name(&self) -> &str {
            &self.cfg.name
        }
        fn config(&self) -> &BotConfig {
            &self.cfg
        }
        fn runtime(&mut self) -> &mut BotRuntime {
            &mut self.rt
        }
        fn decide(&mut self, _ctx: &BotContext, _rng: &mut ChaCha8Rng) -> BotDecision {
            BotDecision::default()
        }
    }

    fn dummy() -> Dummy {
        Dummy {
            cfg: BotConfig {
                name: "Dummy".into(),
                base_latency: 0.1,
                quote_size: 1,
                aggression: 0.25,
                risk_aversion: 0.6,
                inventory_skew: 0.8,
                toxicity_sensitivity: 1.0,
                refresh_min_s: 0.2,
                stickiness_ticks: 1,
            },
            rt: new_runtime(),
        }
    }

    #[test]
    fn first_quote_always_refreshes() {
        let mut d = dummy();
        assert!(d.should_refresh(0.1, Some(100.0), Some(100.2), 0.0));
    }

    #[test]
    fn refresh_gated_by_min_interval_then_by_stickiness() {
        let mut d = dummy();
        d.record_quote(Some(100.0), Some(100.2), 0.0);
        assert!(!d.should_refresh(0.1, Some(100.05), Some(100.25), 0.05));
        assert!(!d.should_refresh(0.1, Some(100.05), Some(100.25), 0.25));
        assert!(d.should_refresh(0.1, Some(101.0), Some(101.2), 0.25));
    }

    #[test]
    fn latency_ready_respects_cooldown() {
        use rand::SeedableRng;
        let mut d = dummy();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(d.latency_ready(0.0, 1.0, &mut rng));
        assert!(!d.latency_ready(0.01, 1.0, &mut rng));
        assert!(d.latency_ready(1.0, 1.0, &mut rng));
    }
}
