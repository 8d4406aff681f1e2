//! Session orchestration: round lifecycle, the tick loop, and user-facing
//! commands.
//!
//! A single seeded RNG and a monotonic tick counter make every run
//! reproducible from `(config, seed)`. `tick(dt)` takes an explicit,
//! caller-supplied time delta rather than reading a wall clock.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use parking_lot::ReentrantMutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;
use uuid::Uuid;

use crate::analytics;
use crate::book::OrderBook;
use crate::bots::BotManager;
use crate::config::DifficultyConfig;
use crate::error::SessionCommandError;
use crate::events::{EventCallback, MarketEvent, MarketSnapshot, SnapshotCallback, Subscribers};
use crate::ledger::Trader;
use crate::matching::MatchingEngine;
use crate::risk::RiskManager;
use crate::types::{Price, Quantity, Side, Timestamp, TradePrint};

const TAPE_CAPACITY: usize = 120;
const LOG_CAPACITY: usize = 50;
const ROUND_ENDING_INTERMISSION: Timestamp = 10.0;
const VOLATILITY_SPIKE_THRESHOLD: f64 = 1.5;
const BOT_SEED_XOR: u64 = 0xA11CE;
const MARGIN_THRESHOLD: f64 = -500.0;
const LOSS_LIMIT: f64 = -1000.0;
const CONCENTRATION_LIMIT: f64 = 0.5;
const POSITION_CHANGE_FRACTION: f64 = 0.75;
const LIQUIDITY_CRASH_FLOOR: Quantity = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    NotStarted,
    RoundActive,
    RoundEnding,
    GameComplete,
    Paused,
}

impl GameState {
    fn as_str(self) -> &'static str {
        match self {
            GameState::NotStarted => "NOT_STARTED",
            GameState::RoundActive => "ROUND_ACTIVE",
            GameState::RoundEnding => "ROUND_ENDING",
            GameState::GameComplete => "GAME_COMPLETE",
            GameState::Paused => "PAUSED",
        }
    }
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        let micros = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_micros() as u64;
        micros & 0xFFFF_FFFF
    })
}

/// One educational market-making session: a digit-guessing game played
/// against a multi-strategy bot roster over a central limit order book.
pub struct Simulator {
    pub config: DifficultyConfig,
    seed: u64,
    rng: ChaCha8Rng,

    book: OrderBook,
    engine: MatchingEngine,
    risk: RiskManager,
    bots: BotManager,
    traders: HashMap<String, Trader>,
    user_id: String,

    state: GameState,
    current_round: u32,
    time_remaining: Timestamp,
    intermission_remaining: Timestamp,
    now: Timestamp,

    all_digits: Vec<u8>,
    revealed: Vec<bool>,
    settlement: Option<i64>,

    volatility: f64,
    liquidity_ok: bool,
    tape: VecDeque<TradePrint>,
    trade_log: VecDeque<String>,
    alert_log: VecDeque<String>,

    subscribers: Subscribers,
}

impl Simulator {
    pub fn new(config: DifficultyConfig, seed: Option<u64>, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let seed = resolve_seed(seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let all_digits: Vec<u8> = (0..config.total_rounds).map(|_| rng.gen_range(0..=9)).collect();
        let revealed = vec![false; all_digits.len()];

        let book = OrderBook::new(config.tick_size, config.quote_lifetime);
        let engine = MatchingEngine::new();
        let risk = RiskManager::new(
            config.position_limit,
            config.position_limit,
            MARGIN_THRESHOLD,
            LOSS_LIMIT,
            CONCENTRATION_LIMIT,
            config.tick_size,
        );
        let bots = BotManager::new(&config, seed ^ BOT_SEED_XOR);

        let mut traders = HashMap::new();
        traders.insert(user_id.clone(), Trader::new(user_id.clone(), false));
        for name in bots.roster_ids() {
            traders.insert(name.clone(), Trader::new(name, true));
        }

        Self {
            config,
            seed,
            rng,
            book,
            engine,
            risk,
            bots,
            traders,
            user_id,
            state: GameState::NotStarted,
            current_round: 0,
            time_remaining: 0.0,
            intermission_remaining: 0.0,
            now: 0.0,
            all_digits,
            revealed,
            settlement: None,
            volatility: 1.0,
            liquidity_ok: true,
            tape: VecDeque::with_capacity(TAPE_CAPACITY),
            trade_log: VecDeque::new(),
            alert_log: VecDeque::new(),
            subscribers: Subscribers::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn subscribe_events(&mut self, cb: EventCallback) {
        self.subscribers.subscribe_events(cb);
    }

    pub fn subscribe_state(&mut self, cb: SnapshotCallback) {
        self.subscribers.subscribe_state(cb);
    }

    // -- round lifecycle --

    pub fn start_round(&mut self, round: u32) -> Result<(), SessionCommandError> {
        if round < 1 || round > self.config.total_rounds {
            return Err(SessionCommandError::InvalidRound { round, total_rounds: self.config.total_rounds });
        }
        if !(self.state == GameState::NotStarted && round == 1) {
            return Err(SessionCommandError::WrongGameState { action: "start_round" });
        }
        self.start_round_internal(round);
        Ok(())
    }

    fn start_round_internal(&mut self, round: u32) {
        self.current_round = round;
        self.time_remaining = self.config.round_time_secs as f64;
        self.state = GameState::RoundActive;
        self.emit(MarketEvent::RoundStart { round, timestamp: self.now });
        self.emit_snapshot();
    }

    fn end_round(&mut self) {
        for trader_id in self.traders.keys().cloned().collect::<Vec<_>>() {
            self.book.cancel_by_trader(&trader_id, None);
        }

        let fv = self.fair_value();
        let idx = (self.current_round - 1) as usize;
        let digit = self.all_digits[idx];
        self.revealed[idx] = true;

        let unknowns = self.revealed.iter().filter(|r| !**r).count() as f64;
        let spike = 1.0 + (0.05 + 0.02 * unknowns) * self.rng.gen_range(0.0..1.0);
        self.volatility = (self.volatility * spike).clamp(1.0, self.config.volatility_cap);

        let board = analytics::leaderboard(self.traders.values(), fv);
        self.emit(MarketEvent::DigitReveal { round: self.current_round, digit, timestamp: self.now });
        self.emit(MarketEvent::RoundEnd { round: self.current_round, revealed_digit: digit, timestamp: self.now });
        self.emit(MarketEvent::Leaderboard {
            entries: board.into_iter().map(|e| (e.trader_id, e.mtm_pnl)).collect(),
            timestamp: self.now,
        });

        self.state = GameState::RoundEnding;
        self.intermission_remaining = ROUND_ENDING_INTERMISSION;
        self.emit_snapshot();
    }

    fn finish_game(&mut self) {
        let settlement: i64 = self.all_digits.iter().map(|&d| d as i64).sum();
        self.settlement = Some(settlement);
        let board = analytics::leaderboard(self.traders.values(), settlement as f64);
        self.emit(MarketEvent::Leaderboard {
            entries: board.into_iter().map(|e| (e.trader_id, e.mtm_pnl)).collect(),
            timestamp: self.now,
        });
        self.state = GameState::GameComplete;
        self.emit_snapshot();
    }

    // -- fair value --

    fn fair_value(&self) -> f64 {
        let known: i64 = self
            .all_digits
            .iter()
            .zip(&self.revealed)
            .filter(|(_, r)| **r)
            .map(|(&d, _)| d as i64)
            .sum();
        let unknowns = self.revealed.iter().filter(|r| !**r).count() as f64;
        known as f64 + 4.5 * unknowns
    }

    fn theoretical_std(&self) -> f64 {
        let unknowns = self.revealed.iter().filter(|r| !**r).count() as f64;
        (8.25 * unknowns).sqrt()
    }

    fn user_toxicity(&self) -> f64 {
        self.traders.get(&self.user_id).map(|t| t.adverse_selection_score()).unwrap_or(0.0)
    }

    // -- tick loop --

    /// Advance the session clock by `dt` seconds and run whatever the
    /// current game state calls for. Internal commands call this with
    /// `dt = 0.0` so their effect is visible immediately without an extra
    /// time advance.
    pub fn tick(&mut self, dt: Timestamp) {
        self.now += dt;

        match self.state {
            GameState::RoundActive => {
                self.time_remaining -= dt;
                self.run_tick_body();
                if self.time_remaining <= 0.0 {
                    self.end_round();
                }
            }
            GameState::RoundEnding => {
                self.intermission_remaining -= dt;
                if self.intermission_remaining <= 0.0 {
                    if self.current_round >= self.config.total_rounds {
                        self.finish_game();
                    } else {
                        let next = self.current_round + 1;
                        self.start_round_internal(next);
                    }
                }
            }
            GameState::NotStarted | GameState::GameComplete | GameState::Paused => {}
        }

        self.emit_snapshot();
    }

    fn run_tick_body(&mut self) {
        self.book.expire(self.now);
        let fv = self.fair_value();
        let tape_snapshot: Vec<TradePrint> = self.tape.iter().cloned().collect();
        let positions_before: HashMap<String, i64> =
            self.traders.iter().map(|(id, t)| (id.clone(), t.position())).collect();

        let ioc_ids = self.bots.update_quotes(
            &mut self.book,
            &mut self.traders,
            &mut self.risk,
            fv,
            self.volatility,
            self.user_toxicity(),
            &tape_snapshot,
            self.now,
        );

        let match_events = self.engine.match_orders(&mut self.book, self.now);
        for event in &match_events {
            self.apply_match(event, fv);
        }

        self.bots.cancel_unmatched(&mut self.book, &ioc_ids);

        let vol_before = self.volatility;
        if match_events.len() > 2 {
            self.volatility *= 1.03;
        } else {
            self.volatility = (self.volatility * 0.999).max(1.0);
        }
        self.volatility = self.volatility.clamp(1.0, self.config.volatility_cap);
        if self.volatility >= VOLATILITY_SPIKE_THRESHOLD && vol_before < VOLATILITY_SPIKE_THRESHOLD {
            self.emit(MarketEvent::VolatilitySpike { volatility: self.volatility, timestamp: self.now });
        }

        let trader_ids: Vec<String> = self.traders.keys().cloned().collect();
        for trader_id in trader_ids {
            let liquidated = {
                let trader = self.traders.get_mut(&trader_id).unwrap();
                self.risk.check_margin_call(trader, fv, self.now)
            };
            if liquidated {
                self.book.cancel_by_trader(&trader_id, None);
                self.push_alert(format!("{trader_id} margin call: position liquidated"));
                self.emit(MarketEvent::MarginCall { trader_id: trader_id.clone(), liquidation_price: fv, timestamp: self.now });
            }
        }

        if self.config.enable_sudden_events {
            self.detect_position_changes(&positions_before);
            self.detect_liquidity_crash();
        }
    }

    /// `position_change` fires when a trader's position flips sign or
    /// crosses `POSITION_CHANGE_FRACTION` of the position limit, in either
    /// direction, versus where it stood at the start of this tick.
    fn detect_position_changes(&mut self, positions_before: &HashMap<String, i64>) {
        let limit = self.risk.position_limit.max(1) as f64;
        let mut events = Vec::new();
        for (trader_id, trader) in &self.traders {
            let before = positions_before.get(trader_id).copied().unwrap_or(0);
            let after = trader.position();
            if before == after {
                continue;
            }
            let flipped = before != 0 && after != 0 && before.signum() != after.signum();
            let crossed_threshold = (before.abs() as f64 / limit < POSITION_CHANGE_FRACTION)
                && (after.abs() as f64 / limit >= POSITION_CHANGE_FRACTION);
            if flipped || crossed_threshold {
                events.push(MarketEvent::PositionChange { trader_id: trader_id.clone(), position: after, timestamp: self.now });
            }
        }
        for event in events {
            self.emit(event);
        }
    }

    /// `liquidity_crash` fires when total resting depth on either side drops
    /// below `LIQUIDITY_CRASH_FLOOR`, once per crossing from a healthy book.
    fn detect_liquidity_crash(&mut self) {
        let thin = self.book.total_quantity(Side::Buy) < LIQUIDITY_CRASH_FLOOR
            || self.book.total_quantity(Side::Sell) < LIQUIDITY_CRASH_FLOOR;
        if thin && self.liquidity_ok {
            self.push_alert("liquidity crash: book depth below floor".to_string());
            self.emit(MarketEvent::LiquidityCrash { timestamp: self.now });
        }
        self.liquidity_ok = !thin;
    }

    fn apply_match(&mut self, event: &crate::types::MatchEvent, fair_value: f64) {
        let is_buyer_taker = event.taker_id == event.buyer_id;
        let buyer_fee = if is_buyer_taker { self.config.taker_fee * event.quantity as f64 } else { 0.0 };
        let seller_fee = if !is_buyer_taker { self.config.taker_fee * event.quantity as f64 } else { 0.0 };

        if let Some(buyer) = self.traders.get_mut(&event.buyer_id) {
            buyer.apply_fill(crate::types::Fill {
                price: event.price,
                quantity: event.quantity,
                side: Side::Buy,
                timestamp: event.timestamp,
                counterparty_id: Some(event.seller_id.clone()),
                fee: buyer_fee,
            });
            buyer.update_adverse_selection(event.price, fair_value, true);
        }
        if let Some(seller) = self.traders.get_mut(&event.seller_id) {
            seller.apply_fill(crate::types::Fill {
                price: event.price,
                quantity: event.quantity,
                side: Side::Sell,
                timestamp: event.timestamp,
                counterparty_id: Some(event.buyer_id.clone()),
                fee: seller_fee,
            });
            seller.update_adverse_selection(event.price, fair_value, false);
        }

        self.push_tape(TradePrint {
            timestamp: event.timestamp,
            price: event.price,
            quantity: event.quantity,
            taker_side: event.taker_side(),
        });
        self.push_trade(format!("{:?} {}@{}", event.taker_side(), event.quantity, event.price));
        self.emit(MarketEvent::TradeExecuted {
            match_id: event.match_id,
            price: event.price,
            quantity: event.quantity,
            taker_side: event.taker_side(),
            timestamp: event.timestamp,
        });
    }

    fn push_tape(&mut self, print: TradePrint) {
        if self.tape.len() >= TAPE_CAPACITY {
            self.tape.pop_front();
        }
        self.tape.push_back(print);
    }

    fn push_trade(&mut self, line: String) {
        if self.trade_log.len() >= LOG_CAPACITY {
            self.trade_log.pop_front();
        }
        self.trade_log.push_back(line);
    }

    fn push_alert(&mut self, line: String) {
        info!(%line, "risk alert");
        if self.alert_log.len() >= LOG_CAPACITY {
            self.alert_log.pop_front();
        }
        self.alert_log.push_back(line);
    }

    fn emit(&mut self, event: MarketEvent) {
        self.subscribers.emit_event(&event);
    }

    fn emit_snapshot(&mut self) {
        let snapshot = self.snapshot();
        self.subscribers.emit_state(&snapshot);
    }

    fn require_active(&self, action: &'static str) -> Result<(), SessionCommandError> {
        if self.state == GameState::RoundActive {
            Ok(())
        } else {
            Err(SessionCommandError::WrongGameState { action })
        }
    }

    // -- user commands --

    pub fn make_market(&mut self, bid: Price, ask: Price, qty: Quantity) -> Result<(), SessionCommandError> {
        self.require_active("make_market")?;
        if qty <= 0 {
            return Err(SessionCommandError::NonPositiveQuantity { quantity: qty });
        }
        if bid <= 0.0 {
            return Err(SessionCommandError::NonPositivePrice { price: bid });
        }
        if ask <= 0.0 {
            return Err(SessionCommandError::NonPositivePrice { price: ask });
        }
        if bid >= ask {
            return Err(SessionCommandError::CrossedQuote { bid, ask });
        }

        self.book.cancel_by_trader(&self.user_id, None);
        if self.risk.validate(self.traders.get(&self.user_id).unwrap(), Side::Buy, qty, bid).is_ok() {
            let _ = self.book.add(self.user_id.clone(), Side::Buy, bid, qty, self.now);
        }
        if self.risk.validate(self.traders.get(&self.user_id).unwrap(), Side::Sell, qty, ask).is_ok() {
            let _ = self.book.add(self.user_id.clone(), Side::Sell, ask, qty, self.now);
        }

        self.tick(0.0);
        Ok(())
    }

    pub fn aggress_buy(&mut self, price: Price, qty: Quantity) -> Result<(), SessionCommandError> {
        self.require_active("aggress_buy")?;
        self.place_aggressive(Side::Buy, price, qty)
    }

    pub fn aggress_sell(&mut self, price: Price, qty: Quantity) -> Result<(), SessionCommandError> {
        self.require_active("aggress_sell")?;
        self.place_aggressive(Side::Sell, price, qty)
    }

    fn place_aggressive(&mut self, side: Side, price: Price, qty: Quantity) -> Result<(), SessionCommandError> {
        if qty <= 0 {
            return Err(SessionCommandError::NonPositiveQuantity { quantity: qty });
        }
        if price <= 0.0 {
            return Err(SessionCommandError::NonPositivePrice { price });
        }

        match self.risk.validate(self.traders.get(&self.user_id).unwrap(), side, qty, price) {
            Ok(()) => {
                let _ = self.book.add(self.user_id.clone(), side, price, qty, self.now);
            }
            Err(reason) => {
                self.risk.log_block(&self.user_id, &reason);
                self.push_alert(format!("{} rejected: {reason}", self.user_id));
                self.emit(MarketEvent::RiskAlert {
                    trader_id: self.user_id.clone(),
                    reason: reason.to_string(),
                    timestamp: self.now,
                });
            }
        }

        self.tick(0.0);
        Ok(())
    }

    pub fn cancel_user_orders(&mut self) -> usize {
        let count = self.book.cancel_by_trader(&self.user_id, None);
        self.tick(0.0);
        count
    }

    // -- snapshot --

    pub fn snapshot(&self) -> MarketSnapshot {
        let fv = self.fair_value();
        let user = self.traders.get(&self.user_id);
        let risk_metrics = user.map(|t| self.risk.risk_metrics(t, fv)).unwrap_or_default();
        let (bid_depth, ask_depth) = self.book.depth(5);

        MarketSnapshot {
            timestamp: self.now,
            game_state: self.state.as_str().to_string(),
            current_round: self.current_round,
            total_rounds: self.config.total_rounds,
            time_remaining: self.time_remaining.max(0.0),

            fair_value: fv,
            theoretical_std: self.theoretical_std(),
            volatility: self.volatility,
            digits: self
                .all_digits
                .iter()
                .zip(&self.revealed)
                .map(|(&d, &r)| if r { Some(d) } else { None })
                .collect(),

            best_bid: self.book.best_bid(),
            best_ask: self.book.best_ask(),
            spread: self.book.spread(),
            mid_price: self.book.mid_price(),
            bid_depth,
            ask_depth,

            user_position: user.map(|t| t.position()).unwrap_or(0),
            user_cash: user.map(|t| t.cash()).unwrap_or(0.0),
            user_fees_paid: user.map(|t| t.fees_paid()).unwrap_or(0.0),
            user_mtm: user.map(|t| t.mark_to_market(fv)).unwrap_or(0.0),
            user_vwap: user.map(|t| t.vwap()).unwrap_or(0.0),
            user_toxicity: self.user_toxicity(),

            risk_position_utilization: risk_metrics.position_utilization,
            risk_margin_cushion: risk_metrics.margin_cushion,
            risk_var_95: risk_metrics.var_95,
            risk_at_risk: risk_metrics.at_risk,

            recent_trades: self.trade_log.iter().cloned().collect(),
            recent_alerts: self.alert_log.iter().cloned().collect(),

            bot_positions: self
                .traders
                .iter()
                .filter(|(_, t)| t.is_bot)
                .map(|(id, t)| (id.clone(), t.position(), t.mark_to_market(fv)))
                .collect(),
            leaderboard: analytics::leaderboard(self.traders.values(), fv)
                .into_iter()
                .map(|e| (e.trader_id, e.mtm_pnl))
                .collect(),
            settlement: self.settlement,

            total_matches: self.engine.stats().total_matches,
            total_volume: self.engine.stats().total_volume,
        }
    }
}

/// Thread-safe session handle. User commands call back into `tick()` while
/// already holding the lock, so ordinary `Mutex` would deadlock on the first
/// reentrant call — `ReentrantMutex` allows the same OS thread to relock,
/// with a `RefCell` underneath for the actual mutation.
pub struct Session {
    inner: ReentrantMutex<RefCell<Simulator>>,
}

impl Session {
    fn new(simulator: Simulator) -> Self {
        Self { inner: ReentrantMutex::new(RefCell::new(simulator)) }
    }

    pub fn state(&self) -> GameState {
        self.inner.lock().borrow().state()
    }

    pub fn seed(&self) -> u64 {
        self.inner.lock().borrow().seed()
    }

    pub fn start_round(&self, round: u32) -> Result<(), SessionCommandError> {
        self.inner.lock().borrow_mut().start_round(round)
    }

    pub fn tick(&self, dt: Timestamp) {
        self.inner.lock().borrow_mut().tick(dt);
    }

    pub fn make_market(&self, bid: Price, ask: Price, qty: Quantity) -> Result<(), SessionCommandError> {
        self.inner.lock().borrow_mut().make_market(bid, ask, qty)
    }

    pub fn aggress_buy(&self, price: Price, qty: Quantity) -> Result<(), SessionCommandError> {
        self.inner.lock().borrow_mut().aggress_buy(price, qty)
    }

    pub fn aggress_sell(&self, price: Price, qty: Quantity) -> Result<(), SessionCommandError> {
        self.inner.lock().borrow_mut().aggress_sell(price, qty)
    }

    pub fn cancel_user_orders(&self) -> usize {
        self.inner.lock().borrow_mut().cancel_user_orders()
    }

    pub fn subscribe_events(&self, cb: EventCallback) {
        self.inner.lock().borrow_mut().subscribe_events(cb);
    }

    pub fn subscribe_state(&self, cb: SnapshotCallback) {
        self.inner.lock().borrow_mut().subscribe_state(cb);
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        self.inner.lock().borrow().snapshot()
    }
}

/// Create a new session: a fresh [`Simulator`] behind a [`Session`] handle,
/// identified by a process-wide-unique session id. Rejects a `config` an
/// embedding application loaded from an untrusted source (file/env/API)
/// before any state is built.
pub fn create_session(
    config: DifficultyConfig,
    seed: Option<u64>,
    user_id: impl Into<String>,
) -> anyhow::Result<(Uuid, Session)> {
    anyhow::ensure!(config.total_rounds > 0, "total_rounds must be > 0, got {}", config.total_rounds);
    anyhow::ensure!(config.round_time_secs > 0, "round_time_secs must be > 0, got {}", config.round_time_secs);
    anyhow::ensure!(config.tick_size > 0.0, "tick_size must be > 0, got {}", config.tick_size);
    anyhow::ensure!(config.position_limit > 0, "position_limit must be > 0, got {}", config.position_limit);
    anyhow::ensure!(config.volatility_cap >= 1.0, "volatility_cap must be >= 1.0, got {}", config.volatility_cap);

    let simulator = Simulator::new(config, seed, user_id);
    Ok((Uuid::new_v4(), Session::new(simulator)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn easy_sim(seed: u64) -> Simulator {
        Simulator::new(DifficultyConfig::easy(), Some(seed), "YOU")
    }

    #[test]
    fn session_starts_not_started_and_advances_on_start_round() {
        let mut sim = easy_sim(1);
        assert_eq!(sim.state(), GameState::NotStarted);
        sim.start_round(1).unwrap();
        assert_eq!(sim.state(), GameState::RoundActive);
        assert_eq!(sim.current_round, 1);
    }

    #[test]
    fn cannot_start_round_twice() {
        let mut sim = easy_sim(1);
        sim.start_round(1).unwrap();
        assert!(sim.start_round(1).is_err());
    }

    #[test]
    fn make_market_rejects_crossed_quote() {
        let mut sim = easy_sim(1);
        sim.start_round(1).unwrap();
        assert_eq!(
            sim.make_market(10.0, 9.0, 1),
            Err(SessionCommandError::CrossedQuote { bid: 10.0, ask: 9.0 })
        );
    }

    #[test]
    fn commands_are_rejected_before_round_start() {
        let mut sim = easy_sim(1);
        assert_eq!(
            sim.make_market(9.0, 10.0, 1),
            Err(SessionCommandError::WrongGameState { action: "make_market" })
        );
    }

    #[test]
    fn round_ends_and_reveals_a_digit_when_time_runs_out() {
        let mut sim = easy_sim(1);
        sim.start_round(1).unwrap();
        sim.tick(sim.config.round_time_secs as f64 + 1.0);
        assert_eq!(sim.state(), GameState::RoundEnding);
        assert!(sim.snapshot().digits[0].is_some());
    }

    #[test]
    fn deterministic_digits_for_fixed_seed() {
        let a = easy_sim(42);
        let b = easy_sim(42);
        assert_eq!(a.all_digits, b.all_digits);
    }

    #[test]
    fn full_game_reaches_settlement() {
        let mut sim = easy_sim(7);
        sim.start_round(1).unwrap();
        let round_time = sim.config.round_time_secs as f64 + 1.0;
        for _ in 0..sim.config.total_rounds {
            sim.tick(round_time);
            sim.tick(ROUND_ENDING_INTERMISSION + 1.0);
        }
        assert_eq!(sim.state(), GameState::GameComplete);
        assert!(sim.snapshot().settlement.is_some());
    }

    #[test]
    fn position_change_fires_on_sign_flip_and_threshold_crossing() {
        let mut sim = easy_sim(1);
        let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = events.clone();
        sim.subscribe_events(Box::new(move |event| {
            if let MarketEvent::PositionChange { trader_id, position, .. } = event {
                recorded.lock().unwrap().push((trader_id.clone(), *position));
            }
        }));

        let before = HashMap::from([("T1".to_string(), 0i64)]);
        sim.traders.insert("T1".to_string(), Trader::new("T1", false));
        sim.traders.get_mut("T1").unwrap().apply_fill(crate::types::Fill {
            price: 100.0,
            quantity: 2,
            side: Side::Buy,
            timestamp: 0.0,
            counterparty_id: None,
            fee: 0.0,
        });
        sim.detect_position_changes(&before);
        assert_eq!(events.lock().unwrap().as_slice(), &[("T1".to_string(), 2)]);
    }

    #[test]
    fn liquidity_crash_fires_once_on_crossing_below_floor() {
        let mut sim = easy_sim(1);
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let recorded = count.clone();
        sim.subscribe_events(Box::new(move |event| {
            if let MarketEvent::LiquidityCrash { .. } = event {
                recorded.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }));

        sim.detect_liquidity_crash();
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
        sim.detect_liquidity_crash();
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1, "should not refire while still thin");
    }

    #[test]
    fn session_wrapper_allows_reentrant_command_tick() {
        let (_id, session) = create_session(DifficultyConfig::easy(), Some(3), "YOU").unwrap();
        session.start_round(1).unwrap();
        assert_eq!(session.state(), GameState::RoundActive);
        session.make_market(9.0, 10.0, 1).unwrap();
        assert!(session.snapshot().best_bid.is_some());
    }

    #[test]
    fn create_session_rejects_invalid_config() {
        let mut bad = DifficultyConfig::easy();
        bad.total_rounds = 0;
        assert!(create_session(bad, Some(1), "YOU").is_err());
    }
}
