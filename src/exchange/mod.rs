pub mod relay;

pub use relay::*;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::TradeReceipt;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("trade rejected: {0}")]
    Rejected(String),
    #[error("insufficient liquidity for ${0}")]
    InsufficientLiquidity(Decimal),
    #[error("executor not initialized")]
    NotInitialized,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Submits trades for the vault token and reports its market price.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// One-time setup before the first cycle. Failures here are fatal.
    async fn initialize(&self) -> Result<(), ExecutorError>;
    async fn get_current_price(&self) -> Result<f64, ExecutorError>;
    async fn buy(&self, amount_usd: Decimal) -> Result<TradeReceipt, ExecutorError>;
    async fn sell(&self, amount_usd: Decimal) -> Result<TradeReceipt, ExecutorError>;
}
