//! Momentum ("Trend Follower") archetype.
//!
//! A fast/slow EMA spread on the mid price plus recent tape flow gate an IOC
//! order; passive quotes lean in the direction of the detected trend.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::{Bot, BotConfig, BotContext, BotDecision, BotRuntime};
use crate::types::Side;

const EMA_FAST_ALPHA: f64 = 0.35;
const EMA_SLOW_ALPHA: f64 = 0.08;
const FLOW_WINDOW: usize = 12;
const THR_FLOW: f64 = 2.0;

#[derive(Debug, Clone, Copy)]
struct Ewm {
    alpha: f64,
    value: Option<f64>,
}

impl Ewm {
    fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    fn update(&mut self, x: f64) -> f64 {
        let next = match self.value {
            Some(v) => self.alpha * x + (1.0 - self.alpha) * v,
            None => x,
        };
        self.value = Some(next);
        next
    }
}

pub struct MomentumTrader {
    cfg: BotConfig,
    rt: BotRuntime,
    ema_fast: Ewm,
    ema_slow: Ewm,
}

impl MomentumTrader {
    pub fn new(cfg: BotConfig) -> Self {
        Self {
            cfg,
            rt: BotRuntime::default(),
            ema_fast: Ewm::new(EMA_FAST_ALPHA),
            ema_slow: Ewm::new(EMA_SLOW_ALPHA),
        }
    }
}

impl Bot for MomentumTrader {
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
        let mid = ctx.book.mid_price().unwrap_or(ctx.fair_value);
        let fast = self.ema_fast.update(mid);
        let slow = self.ema_slow.update(mid);
        let trend = fast - slow;

        let flow: i64 = ctx
            .tape
            .iter()
            .rev()
            .take(FLOW_WINDOW)
            .map(|p| match p.taker_side {
                Side::Buy => p.quantity,
                Side::Sell => -p.quantity,
            })
            .sum();
        let flow = flow as f64;

        let vol = ctx.volatility.max(0.25);
        let thr_trend = 0.25 * vol;

        let mut ioc_orders = Vec::new();
        if ctx.position < ctx.position_limit
            && trend > thr_trend
            && flow > THR_FLOW
            && rng.gen_range(0.0..1.0) < self.cfg.aggression
        {
            ioc_orders.push((Side::Buy, self.cfg.quote_size));
        } else if ctx.position > -ctx.position_limit
            && trend < -thr_trend
            && flow < -THR_FLOW
            && rng.gen_range(0.0..1.0) < self.cfg.aggression
        {
            ioc_orders.push((Side::Sell, self.cfg.quote_size));
        }

        let spread = (1.2 + 0.9 * vol).clamp(1.0, 4.0);
        let lean = (trend / (2.0 * thr_trend)).clamp(-1.0, 1.0) * 0.25 * spread;

        let mut bid = Some(ctx.book.snap_price(ctx.fair_value - spread / 2.0 + lean));
        let mut ask = Some(ctx.book.snap_price(ctx.fair_value + spread / 2.0 + lean));
        if ctx.position >= ctx.position_limit {
            bid = None;
        }
        if ctx.position <= -ctx.position_limit {
            ask = None;
        }

        BotDecision { bid, ask, ioc_orders }
    }
}
