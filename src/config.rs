//! Session configuration: difficulty presets and tunables.
//!
//! Four named presets (`easy`/`medium`/`hard`/`axxela`) plus a `Default`
//! impl. `serde`-derived so an embedding application can load these from
//! TOML/JSON/env; the core never reads a file itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    pub name: String,
    pub round_time_secs: u32,
    pub quote_lifetime: f64,
    /// Hard game rule: position_limit is fixed at ±2 across all
    /// difficulties; difficulty mainly changes bot speed/fees/events.
    pub position_limit: i64,
    pub taker_fee: f64,
    pub bot_latency_mult: f64,
    pub toxicity_threshold: f64,
    pub volatility_cap: f64,
    pub enable_sudden_events: bool,
    pub total_rounds: u32,
    pub tick_size: f64,
}

impl DifficultyConfig {
    pub fn easy() -> Self {
        Self {
            name: "EASY".into(),
            round_time_secs: 120,
            quote_lifetime: 9.0,
            position_limit: 2,
            taker_fee: 0.00,
            bot_latency_mult: 2.0,
            toxicity_threshold: 10.0,
            volatility_cap: 3.0,
            enable_sudden_events: false,
            total_rounds: 6,
            tick_size: 0.1,
        }
    }

    pub fn medium() -> Self {
        Self {
            name: "MEDIUM".into(),
            round_time_secs: 90,
            quote_lifetime: 7.0,
            position_limit: 2,
            taker_fee: 0.10,
            bot_latency_mult: 1.2,
            toxicity_threshold: 4.0,
            volatility_cap: 4.5,
            enable_sudden_events: true,
            total_rounds: 6,
            tick_size: 0.1,
        }
    }

    pub fn hard() -> Self {
        Self {
            name: "HARD".into(),
            round_time_secs: 75,
            quote_lifetime: 6.0,
            position_limit: 2,
            taker_fee: 0.15,
            bot_latency_mult: 0.9,
            toxicity_threshold: 3.0,
            volatility_cap: 6.0,
            enable_sudden_events: true,
            total_rounds: 6,
            tick_size: 0.1,
        }
    }

    pub fn axxela() -> Self {
        Self {
            name: "AXXELA".into(),
            round_time_secs: 60,
            quote_lifetime: 5.0,
            position_limit: 2,
            taker_fee: 0.20,
            bot_latency_mult: 0.65,
            toxicity_threshold: 2.0,
            volatility_cap: 7.0,
            enable_sudden_events: true,
            total_rounds: 6,
            tick_size: 0.1,
        }
    }
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self::medium()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_carry_the_hard_position_limit_rule() {
        for cfg in [
            DifficultyConfig::easy(),
            DifficultyConfig::medium(),
            DifficultyConfig::hard(),
            DifficultyConfig::axxela(),
        ] {
            assert_eq!(cfg.position_limit, 2);
            assert_eq!(cfg.total_rounds, 6);
        }
    }

    #[test]
    fn harder_presets_have_lower_latency_and_higher_fees() {
        let easy = DifficultyConfig::easy();
        let axxela = DifficultyConfig::axxela();
        assert!(axxela.bot_latency_mult < easy.bot_latency_mult);
        assert!(axxela.taker_fee > easy.taker_fee);
    }
}
