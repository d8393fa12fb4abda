use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::PaperSettings;
use crate::exchange::{ExecutorError, TradeExecutor};
use crate::types::{Side, TradeReceipt};

/// Trades that would move the pool price by more than this fraction are refused.
const MAX_PRICE_IMPACT: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolSnapshot {
    pub price: f64,
    pub usd_reserve: f64,
    pub token_reserve: f64,
    pub fees_usd: f64,
    pub trades: u64,
}

#[derive(Debug)]
struct PoolState {
    usd_reserve: f64,
    token_reserve: f64,
    fees_usd: f64,
    trades: u64,
    initialized: bool,
}

impl PoolState {
    fn price(&self) -> f64 {
        self.usd_reserve / self.token_reserve
    }

    fn invariant(&self) -> f64 {
        self.usd_reserve * self.token_reserve
    }

    fn within_impact(&self, usd_reserve: f64, token_reserve: f64) -> bool {
        let new_price = usd_reserve / token_reserve;
        (new_price / self.price() - 1.0).abs() <= MAX_PRICE_IMPACT
    }
}

/// Simulated constant-product pool (`usd * token = k`) used for paper trading.
/// Buys push the price up and sells push it down.
pub struct PaperExecutor {
    state: RwLock<PoolState>,
    fee_rate: f64,
}

impl PaperExecutor {
    pub fn new(settings: &PaperSettings) -> Self {
        let token_reserve = if settings.initial_price > 0.0 {
            settings.usd_reserve / settings.initial_price
        } else {
            0.0
        };

        Self {
            state: RwLock::new(PoolState {
                usd_reserve: settings.usd_reserve,
                token_reserve,
                fees_usd: 0.0,
                trades: 0,
                initialized: false,
            }),
            fee_rate: settings.fee_bps as f64 / 10_000.0,
        }
    }

    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.read().await;
        PoolSnapshot {
            price: state.price(),
            usd_reserve: state.usd_reserve,
            token_reserve: state.token_reserve,
            fees_usd: state.fees_usd,
            trades: state.trades,
        }
    }

    fn amount_to_f64(amount_usd: Decimal) -> Result<f64, ExecutorError> {
        match amount_usd.to_f64() {
            Some(amount) if amount > 0.0 => Ok(amount),
            _ => Err(ExecutorError::Rejected(format!("invalid trade amount ${}", amount_usd))),
        }
    }
}

#[async_trait]
impl TradeExecutor for PaperExecutor {
    async fn initialize(&self) -> Result<(), ExecutorError> {
        let mut state = self.state.write().await;
        if !(state.usd_reserve > 0.0 && state.token_reserve > 0.0) {
            return Err(ExecutorError::Rejected("paper pool needs positive reserves".to_string()));
        }
        state.initialized = true;

        info!(
            "Paper pool ready: ${:.2} / {:.4} tokens @ ${:.6}",
            state.usd_reserve, state.token_reserve, state.price()
        );
        Ok(())
    }

    async fn get_current_price(&self) -> Result<f64, ExecutorError> {
        let state = self.state.read().await;
        if !state.initialized {
            return Err(ExecutorError::NotInitialized);
        }
        Ok(state.price())
    }

    async fn buy(&self, amount_usd: Decimal) -> Result<TradeReceipt, ExecutorError> {
        let amount = Self::amount_to_f64(amount_usd)?;
        let mut state = self.state.write().await;
        if !state.initialized {
            return Err(ExecutorError::NotInitialized);
        }

        let fee = amount * self.fee_rate;
        let k = state.invariant();
        let tokens_out = state.token_reserve - k / (state.usd_reserve + amount - fee);
        if !(tokens_out > 0.0)
            || tokens_out >= state.token_reserve
            || !state.within_impact(state.usd_reserve + amount, state.token_reserve - tokens_out)
        {
            return Err(ExecutorError::InsufficientLiquidity(amount_usd));
        }

        state.usd_reserve += amount;
        state.token_reserve -= tokens_out;
        state.fees_usd += fee;
        state.trades += 1;

        debug!("Paper buy ${} -> {:.6} tokens, price now {:.6}", amount_usd, tokens_out, state.price());
        Ok(TradeReceipt::new(Side::Buy, amount_usd).with_token_amount(tokens_out))
    }

    async fn sell(&self, amount_usd: Decimal) -> Result<TradeReceipt, ExecutorError> {
        let amount = Self::amount_to_f64(amount_usd)?;
        let mut state = self.state.write().await;
        if !state.initialized {
            return Err(ExecutorError::NotInitialized);
        }

        // Sell the token quantity worth `amount` at the current spot price.
        let tokens_in = amount / state.price();
        let k = state.invariant();
        let usd_out = state.usd_reserve - k / (state.token_reserve + tokens_in * (1.0 - self.fee_rate));
        if !(usd_out > 0.0)
            || usd_out >= state.usd_reserve
            || !state.within_impact(state.usd_reserve - usd_out, state.token_reserve + tokens_in)
        {
            return Err(ExecutorError::InsufficientLiquidity(amount_usd));
        }

        state.usd_reserve -= usd_out;
        state.token_reserve += tokens_in;
        state.fees_usd += amount * self.fee_rate;
        state.trades += 1;

        debug!("Paper sell {:.6} tokens -> ${:.2}, price now {:.6}", tokens_in, usd_out, state.price());
        Ok(TradeReceipt::new(Side::Sell, amount_usd).with_token_amount(tokens_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings() -> PaperSettings {
        PaperSettings {
            initial_price: 2.0,
            usd_reserve: 10_000.0,
            fee_bps: 30,
        }
    }

    async fn ready_pool() -> PaperExecutor {
        let pool = PaperExecutor::new(&settings());
        pool.initialize().await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_initial_price() {
        let pool = ready_pool().await;
        let price = pool.get_current_price().await.unwrap();
        assert!((price - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_requires_initialize() {
        let pool = PaperExecutor::new(&settings());
        assert!(matches!(pool.get_current_price().await, Err(ExecutorError::NotInitialized)));
        assert!(matches!(pool.buy(dec!(10)).await, Err(ExecutorError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_initialize_rejects_empty_pool() {
        let pool = PaperExecutor::new(&PaperSettings {
            initial_price: 0.0,
            ..settings()
        });
        assert!(pool.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_buy_raises_price() {
        let pool = ready_pool().await;
        let receipt = pool.buy(dec!(100)).await.unwrap();
        let price = pool.get_current_price().await.unwrap();

        assert_eq!(receipt.side, Side::Buy);
        assert_eq!(receipt.amount_usd, dec!(100));
        assert!(receipt.token_amount.unwrap() < 50.0);
        assert!(price > 2.0);
    }

    #[tokio::test]
    async fn test_sell_lowers_price() {
        let pool = ready_pool().await;
        let receipt = pool.sell(dec!(100)).await.unwrap();
        let price = pool.get_current_price().await.unwrap();

        assert_eq!(receipt.side, Side::Sell);
        assert!((receipt.token_amount.unwrap() - 50.0).abs() < 1e-9);
        assert!(price < 2.0);
    }

    #[tokio::test]
    async fn test_fees_accumulate_and_grow_invariant() {
        let pool = ready_pool().await;
        let before = pool.snapshot().await;
        pool.buy(dec!(500)).await.unwrap();
        pool.sell(dec!(500)).await.unwrap();
        let after = pool.snapshot().await;

        assert_eq!(after.trades, 2);
        assert!((after.fees_usd - 3.0).abs() < 1e-9);
        assert!(after.usd_reserve * after.token_reserve > before.usd_reserve * before.token_reserve);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let pool = ready_pool().await;
        assert!(matches!(pool.buy(dec!(0)).await, Err(ExecutorError::Rejected(_))));
        assert!(matches!(pool.sell(dec!(-5)).await, Err(ExecutorError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_oversized_sell_is_rejected() {
        let pool = ready_pool().await;
        let err = pool.sell(dec!(1000000000)).await;
        assert!(matches!(err, Err(ExecutorError::InsufficientLiquidity(_))));

        let snapshot = pool.snapshot().await;
        assert_eq!(snapshot.trades, 0);
        assert!((snapshot.price - 2.0).abs() < 1e-12);
    }
}
