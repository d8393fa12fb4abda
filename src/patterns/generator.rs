use crate::config::PatternSettings;
use crate::types::{BaseShift, Side, TradeDecision};

use super::random::{uniform, RandomSource};

const MOMENTUM_DECAY: f64 = 0.7;
const TREND_DECAY: f64 = 0.9;

/// Mean-reverting / trending / momentum model that decides the direction and
/// size of synthetic trades and absorbs observed prices.
///
/// Call order per cycle is `next_trade`, then `update_price` with the price
/// observed after the trade, then `maybe_shift_base`.
pub struct PricePatternGenerator {
    base_price: f64,
    current_price: f64,
    trend: f64,
    momentum: f64,
    settings: PatternSettings,
    rng: Box<dyn RandomSource>,
}

impl PricePatternGenerator {
    pub fn new(initial_price: f64, settings: PatternSettings, rng: Box<dyn RandomSource>) -> Self {
        debug_assert!(initial_price > 0.0, "initial price must be positive");
        Self {
            base_price: initial_price,
            current_price: initial_price,
            trend: 0.0,
            momentum: 0.0,
            settings,
            rng,
        }
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn trend(&self) -> f64 {
        self.trend
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    pub fn deviation(&self) -> f64 {
        (self.current_price - self.base_price) / self.base_price
    }

    /// Probability that the next trade is a buy, clamped to `[0, 1]`.
    pub fn buy_probability(&self) -> f64 {
        let mean_reversion_force = -self.deviation() * self.settings.mean_reversion_strength;
        let trend_force = self.trend * self.settings.trend_strength;
        let momentum_force = self.momentum * self.settings.momentum_strength;

        (0.5 + mean_reversion_force + trend_force + momentum_force).clamp(0.0, 1.0)
    }

    pub fn next_trade(&mut self) -> TradeDecision {
        let roll = self.rng.next_f64();
        let deviation = self.deviation();
        let buy_probability = self.buy_probability();

        let side = if roll < buy_probability { Side::Buy } else { Side::Sell };
        // Trades get larger the further price sits from the base.
        let size_multiplier = 0.5 + self.rng.next_f64() + deviation.abs() * 2.0;

        TradeDecision {
            side,
            size_multiplier,
            buy_probability,
            deviation,
        }
    }

    pub fn update_price(&mut self, new_price: f64) {
        debug_assert!(new_price > 0.0, "observed price must be positive");
        let change = (new_price - self.current_price) / self.current_price;

        self.momentum = self.momentum * MOMENTUM_DECAY + change * (1.0 - MOMENTUM_DECAY);
        self.trend = self.trend * TREND_DECAY + change * (1.0 - TREND_DECAY);
        self.current_price = new_price;
    }

    /// Occasionally moves the base price to simulate a news event.
    /// Returns the applied shift; the caller decides whether to report it.
    pub fn maybe_shift_base(&mut self) -> Option<BaseShift> {
        if self.rng.next_f64() >= self.settings.shift_probability {
            return None;
        }

        let max_shift = self.settings.max_shift;
        let shift = uniform(self.rng.as_mut(), -max_shift, max_shift);
        let previous_base = self.base_price;
        let factor = 1.0 + shift;
        self.base_price *= factor;

        Some(BaseShift {
            previous_base,
            new_base: self.base_price,
            factor,
        })
    }

    #[cfg(test)]
    pub(crate) fn set_state(&mut self, current_price: f64, trend: f64, momentum: f64) {
        self.current_price = current_price;
        self.trend = trend;
        self.momentum = momentum;
    }
}

impl std::fmt::Debug for PricePatternGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricePatternGenerator")
            .field("base_price", &self.base_price)
            .field("current_price", &self.current_price)
            .field("trend", &self.trend)
            .field("momentum", &self.momentum)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::ScriptedRandom;

    const EPS: f64 = 1e-12;

    fn settings(mean_reversion_strength: f64, trend_strength: f64) -> PatternSettings {
        PatternSettings {
            mean_reversion_strength,
            trend_strength,
            ..PatternSettings::default()
        }
    }

    fn generator(initial: f64, settings: PatternSettings, draws: Vec<f64>) -> PricePatternGenerator {
        PricePatternGenerator::new(initial, settings, Box::new(ScriptedRandom::new(draws)))
    }

    #[test]
    fn test_new_initializes_state() {
        let gen = generator(2.5, PatternSettings::default(), vec![0.5]);
        assert_eq!(gen.base_price(), 2.5);
        assert_eq!(gen.current_price(), 2.5);
        assert_eq!(gen.trend(), 0.0);
        assert_eq!(gen.momentum(), 0.0);
        assert_eq!(gen.buy_probability(), 0.5);
    }

    #[test]
    fn test_mean_reversion_probability() {
        let mut gen = generator(1.0, settings(0.5, 0.0), vec![0.5]);
        gen.set_state(1.5, 0.0, 0.0);

        assert!((gen.deviation() - 0.5).abs() < EPS);
        assert!((gen.buy_probability() - 0.25).abs() < EPS);
    }

    #[test]
    fn test_probability_decreases_with_deviation() {
        let mut gen = generator(100.0, settings(0.5, 0.3), vec![0.5]);
        let mut last = f64::INFINITY;
        for price in [80.0, 90.0, 100.0, 110.0, 120.0] {
            gen.set_state(price, 0.02, -0.01);
            let p = gen.buy_probability();
            assert!(p < last, "probability must fall as price rises: {} at {}", p, price);
            last = p;
        }

        gen.set_state(90.0, 0.0, 0.0);
        assert!(gen.buy_probability() > 0.5);
        gen.set_state(110.0, 0.0, 0.0);
        assert!(gen.buy_probability() < 0.5);
    }

    #[test]
    fn test_trend_and_momentum_forces() {
        let mut gen = generator(100.0, settings(0.0, 2.0), vec![0.5]);
        gen.set_state(100.0, 0.05, 0.2);
        // 0.5 + 0.05 * 2.0 + 0.2 * 0.1
        assert!((gen.buy_probability() - 0.62).abs() < EPS);
    }

    #[test]
    fn test_probability_is_clamped() {
        let mut gen = generator(100.0, settings(5.0, 0.0), vec![0.5]);
        gen.set_state(200.0, 0.0, 0.0);
        assert_eq!(gen.buy_probability(), 0.0);
        gen.set_state(10.0, 0.0, 0.0);
        assert_eq!(gen.buy_probability(), 1.0);
    }

    #[test]
    fn test_next_trade_side_follows_draw() {
        let mut gen = generator(1.0, settings(0.5, 0.0), vec![0.2, 0.0, 0.3, 0.0]);
        gen.set_state(1.5, 0.0, 0.0);

        let first = gen.next_trade();
        assert!(first.is_buy(), "0.2 < 0.25 should buy");
        let second = gen.next_trade();
        assert_eq!(second.side, Side::Sell, "0.3 >= 0.25 should sell");
        assert!((second.buy_probability - 0.25).abs() < EPS);
        assert!((second.deviation - 0.5).abs() < EPS);
    }

    #[test]
    fn test_size_multiplier_baseline() {
        let mut gen = generator(10.0, PatternSettings::default(), vec![0.9, 0.25]);
        let decision = gen.next_trade();
        assert!((decision.size_multiplier - 0.75).abs() < EPS);
    }

    #[test]
    fn test_size_grows_with_deviation() {
        let draws = vec![0.5, 0.4];
        let mut near = generator(100.0, PatternSettings::default(), draws.clone());
        near.set_state(102.0, 0.0, 0.0);
        let mut far = generator(100.0, PatternSettings::default(), draws);
        far.set_state(90.0, 0.0, 0.0);

        let near_size = near.next_trade().size_multiplier;
        let far_size = far.next_trade().size_multiplier;
        assert!(far_size >= near_size);
        assert!((near_size - (0.9 + 0.04)).abs() < EPS);
        assert!((far_size - (0.9 + 0.2)).abs() < EPS);
    }

    #[test]
    fn test_update_price_smoothing() {
        let mut gen = generator(100.0, PatternSettings::default(), vec![0.5]);
        gen.update_price(110.0);

        assert!((gen.momentum() - 0.03).abs() < EPS);
        assert!((gen.trend() - 0.01).abs() < EPS);
        assert_eq!(gen.current_price(), 110.0);
        assert_eq!(gen.base_price(), 100.0);
    }

    #[test]
    fn test_unchanged_price_decays_signals() {
        let mut gen = generator(100.0, PatternSettings::default(), vec![0.5]);
        gen.set_state(100.0, 0.4, -0.8);

        for _ in 0..5 {
            let (trend, momentum) = (gen.trend(), gen.momentum());
            gen.update_price(gen.current_price());
            assert!((gen.momentum() - momentum * 0.7).abs() < EPS);
            assert!((gen.trend() - trend * 0.9).abs() < EPS);
        }

        for _ in 0..500 {
            gen.update_price(gen.current_price());
        }
        assert!(gen.momentum().abs() < 1e-9);
        assert!(gen.trend().abs() < 1e-9);
    }

    #[test]
    fn test_shift_bounds() {
        for draw in [0.0, 0.25, 0.5, 0.75, 0.999_999] {
            let mut gen = generator(100.0, PatternSettings::default(), vec![0.001, draw]);
            let shift = gen.maybe_shift_base().expect("draw below probability should shift");

            assert!(shift.factor >= 0.96 && shift.factor <= 1.04, "factor {}", shift.factor);
            assert_eq!(shift.previous_base, 100.0);
            assert!((gen.base_price() - 100.0 * shift.factor).abs() < EPS);
            assert_eq!(shift.new_base, gen.base_price());
        }
    }

    #[test]
    fn test_shift_extremes() {
        let mut gen = generator(50.0, PatternSettings::default(), vec![0.0, 0.0]);
        let shift = gen.maybe_shift_base().unwrap();
        assert!((shift.factor - 0.96).abs() < EPS);
    }

    #[test]
    fn test_no_shift_when_draws_high() {
        let mut gen = generator(100.0, PatternSettings::default(), vec![0.006, 0.5, 0.99]);
        for _ in 0..1000 {
            assert!(gen.maybe_shift_base().is_none());
        }
        assert_eq!(gen.base_price(), 100.0);
    }

    #[test]
    fn test_shift_leaves_current_price_alone() {
        let mut gen = generator(100.0, PatternSettings::default(), vec![0.0, 1.0 - 1e-9]);
        gen.update_price(101.0);
        gen.maybe_shift_base().unwrap();
        assert_eq!(gen.current_price(), 101.0);
        assert!(gen.base_price() > 103.9);
    }
}
