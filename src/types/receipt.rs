use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Side;

/// What an executor reports back after submitting a trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub id: String,
    pub side: Side,
    pub amount_usd: Decimal,
    /// Token quantity bought or sold, when the executor knows it.
    pub token_amount: Option<f64>,
    pub tx_hash: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl TradeReceipt {
    pub fn new(side: Side, amount_usd: Decimal) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            side,
            amount_usd,
            token_amount: None,
            tx_hash: None,
            executed_at: Utc::now(),
        }
    }

    pub fn with_token_amount(mut self, token_amount: f64) -> Self {
        self.token_amount = Some(token_amount);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn reference(&self) -> &str {
        self.tx_hash.as_deref().unwrap_or(&self.id)
    }
}
