use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub trading: TradingSettings,
    pub pattern: PatternSettings,
    pub retry: RetrySettings,
    pub executor: ExecutorSettings,
    pub paper: PaperSettings,
}

impl BotConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Trading validation
        if !(self.trading.min_trade_usd > 0.0) {
            errors.push("trading.min_trade_usd must be > 0".to_string());
        }
        if self.trading.max_trade_usd < self.trading.min_trade_usd {
            errors.push("trading.max_trade_usd must be >= min_trade_usd".to_string());
        }
        if self.trading.max_interval_ms < self.trading.min_interval_ms {
            errors.push("trading.max_interval_ms must be >= min_interval_ms".to_string());
        }

        // Pattern validation
        if !(0.0..=1.0).contains(&self.pattern.shift_probability) {
            errors.push("pattern.shift_probability must be between 0 and 1".to_string());
        }
        if !(0.0..1.0).contains(&self.pattern.max_shift) {
            errors.push("pattern.max_shift must be in [0, 1)".to_string());
        }
        let strengths = [
            self.pattern.mean_reversion_strength,
            self.pattern.trend_strength,
            self.pattern.momentum_strength,
        ];
        if strengths.iter().any(|s| !s.is_finite()) {
            errors.push("pattern strengths must be finite".to_string());
        }

        // Retry validation
        if self.retry.strategy == RetryStrategy::Exponential
            && !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0)
        {
            errors.push("retry.multiplier must be finite and >= 1".to_string());
        }
        if self.retry.max_attempts == Some(0) {
            errors.push("retry.max_attempts must be > 0 when set".to_string());
        }

        // Paper pool validation
        if !(self.paper.initial_price > 0.0) {
            errors.push("paper.initial_price must be > 0".to_string());
        }
        if !(self.paper.usd_reserve > 0.0) {
            errors.push("paper.usd_reserve must be > 0".to_string());
        }
        if self.paper.fee_bps >= 10_000 {
            errors.push("paper.fee_bps must be < 10000".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Trade size and pacing bounds for the trading loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    pub min_trade_usd: f64,
    pub max_trade_usd: f64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            min_trade_usd: 10.0,
            max_trade_usd: 100.0,
            min_interval_ms: 30_000,
            max_interval_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    pub mean_reversion_strength: f64,
    pub trend_strength: f64,
    pub momentum_strength: f64,
    /// Chance per cycle that the base price moves.
    pub shift_probability: f64,
    /// Largest fractional move of the base price in one shift.
    pub max_shift: f64,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            mean_reversion_strength: 0.3,
            trend_strength: 0.2,
            momentum_strength: 0.1,
            shift_probability: 0.005,
            max_shift: 0.04,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub strategy: RetryStrategy,
    pub cooldown_secs: u64,
    /// Consecutive failures tolerated before the loop gives up. Unset retries forever.
    pub max_attempts: Option<u32>,
    pub max_delay_secs: u64,
    pub multiplier: f64,
}

impl RetrySettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Fixed,
            cooldown_secs: 10,
            max_attempts: None,
            max_delay_secs: 300,
            multiplier: 2.0,
        }
    }
}

/// Connection details for the HTTP trade relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub base_url: String,
    pub token: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: "VAULT".to_string(),
            api_key: None,
            api_secret: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    pub initial_price: f64,
    pub usd_reserve: f64,
    pub fee_bps: u32,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            initial_price: 1.0,
            usd_reserve: 100_000.0,
            fee_bps: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.cooldown(), Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, None);
        assert_eq!(config.pattern.shift_probability, 0.005);
        assert_eq!(config.pattern.momentum_strength, 0.1);
    }

    #[test]
    fn test_validation_rejects_bad_trade_bounds() {
        let mut config = BotConfig::default();
        config.trading.min_trade_usd = 0.0;
        config.trading.max_trade_usd = -1.0;
        config.trading.min_interval_ms = 5_000;
        config.trading.max_interval_ms = 1_000;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("min_trade_usd"));
    }

    #[test]
    fn test_degenerate_ranges_are_valid() {
        let mut config = BotConfig::default();
        config.trading.min_trade_usd = 10.0;
        config.trading.max_trade_usd = 10.0;
        config.trading.min_interval_ms = 0;
        config.trading.max_interval_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_pattern_and_pool() {
        let mut config = BotConfig::default();
        config.pattern.shift_probability = 1.5;
        config.pattern.max_shift = 1.0;
        config.pattern.trend_strength = f64::NAN;
        config.paper.initial_price = 0.0;
        config.retry.max_attempts = Some(0);

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_validation_rejects_bad_backoff_multiplier() {
        let mut config = BotConfig::default();
        config.retry.strategy = RetryStrategy::Exponential;
        config.retry.max_delay_secs = u64::MAX;
        assert!(config.validate().is_ok());

        for multiplier in [f64::NAN, f64::INFINITY, 0.5] {
            config.retry.multiplier = multiplier;
            let errors = config.validate().unwrap_err();
            assert_eq!(errors, vec!["retry.multiplier must be finite and >= 1"]);
        }
    }
}
