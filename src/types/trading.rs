use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    Paper,
    Live,
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Paper => write!(f, "Paper"),
            TradingMode::Live => write!(f, "Live"),
        }
    }
}

/// Direction and relative size of the next synthetic trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeDecision {
    pub side: Side,
    pub size_multiplier: f64,
    /// Buy probability the side was drawn against, after clamping.
    pub buy_probability: f64,
    /// Signed fractional distance of the current price from the base price.
    pub deviation: f64,
}

impl TradeDecision {
    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }
}

/// A simulated news shock applied to the reference price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaseShift {
    pub previous_base: f64,
    pub new_base: f64,
    pub factor: f64,
}

impl BaseShift {
    pub fn shift_pct(&self) -> f64 {
        (self.factor - 1.0) * 100.0
    }
}

impl fmt::Display for BaseShift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "base {:.6} -> {:.6} ({:+.2}%)",
            self.previous_base,
            self.new_base,
            self.shift_pct()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_helpers() {
        assert_eq!(Side::Sell.to_string(), "SELL");
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"buy\"");
    }

    #[test]
    fn test_base_shift_display() {
        let shift = BaseShift { previous_base: 100.0, new_base: 103.0, factor: 1.03 };
        assert!((shift.shift_pct() - 3.0).abs() < 1e-9);
        assert_eq!(shift.to_string(), "base 100.000000 -> 103.000000 (+3.00%)");
    }
}
