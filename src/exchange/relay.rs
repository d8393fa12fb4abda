use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{ExecutorError, TradeExecutor};
use crate::config::ExecutorSettings;
use crate::types::{Side, TradeReceipt};

type HmacSha256 = Hmac<Sha256>;

/// Trade executor that forwards orders to an HTTP transaction relayer.
///
/// Endpoints, relative to `base_url`:
/// - `GET  /health`
/// - `GET  /price?token=<token>` -> `{"price": f64}`
/// - `POST /trade` with `{"token", "side", "amountUsd"}` -> `{"txHash", "tokenAmount"?}`
#[derive(Debug)]
pub struct HttpRelayExecutor {
    client: Client,
    base_url: String,
    token: String,
    api_key: Option<String>,
    api_secret: Option<String>,
    initialized: AtomicBool,
}

impl HttpRelayExecutor {
    pub fn new(settings: &ExecutorSettings) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
            initialized: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn sign(&self, timestamp: i64, body: &str) -> Option<String> {
        let secret = self.api_secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(body.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    fn authorize(&self, request: RequestBuilder, body: &str) -> RequestBuilder {
        let mut request = request;
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }
        let timestamp = Utc::now().timestamp_millis();
        if let Some(signature) = self.sign(timestamp, body) {
            request = request
                .header("X-Timestamp", timestamp.to_string())
                .header("X-Signature", signature);
        }
        request
    }

    async fn check_status(resp: Response) -> Result<Response, ExecutorError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(ExecutorError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn ensure_initialized(&self) -> Result<(), ExecutorError> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ExecutorError::NotInitialized)
        }
    }

    async fn submit(&self, side: Side, amount_usd: Decimal) -> Result<TradeReceipt, ExecutorError> {
        self.ensure_initialized()?;

        let request = TradeRequest {
            token: &self.token,
            side,
            amount_usd,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ExecutorError::InvalidResponse(e.to_string()))?;

        debug!("Submitting trade to relay: {}", body);

        let resp = self
            .authorize(self.client.post(self.url("trade")), &body)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        let trade: TradeResponse = resp.json().await?;

        if let Some(reason) = trade.error {
            return Err(ExecutorError::Rejected(reason));
        }
        let tx_hash = trade
            .tx_hash
            .ok_or_else(|| ExecutorError::InvalidResponse("missing txHash".to_string()))?;

        let mut receipt = TradeReceipt::new(side, amount_usd).with_tx_hash(tx_hash);
        if let Some(token_amount) = trade.token_amount {
            receipt = receipt.with_token_amount(token_amount);
        }
        Ok(receipt)
    }
}

#[async_trait]
impl TradeExecutor for HttpRelayExecutor {
    async fn initialize(&self) -> Result<(), ExecutorError> {
        info!("Connecting to trade relay at {}", self.base_url);
        let resp = self
            .authorize(self.client.get(self.url("health")), "")
            .send()
            .await?;
        Self::check_status(resp).await?;

        self.initialized.store(true, Ordering::Release);
        info!("Trade relay ready for {}", self.token);
        Ok(())
    }

    async fn get_current_price(&self) -> Result<f64, ExecutorError> {
        self.ensure_initialized()?;
        let resp = self
            .client
            .get(self.url("price"))
            .query(&[("token", self.token.as_str())])
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        let price: PriceResponse = resp.json().await?;
        Ok(price.price)
    }

    async fn buy(&self, amount_usd: Decimal) -> Result<TradeReceipt, ExecutorError> {
        self.submit(Side::Buy, amount_usd).await
    }

    async fn sell(&self, amount_usd: Decimal) -> Result<TradeReceipt, ExecutorError> {
        self.submit(Side::Sell, amount_usd).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TradeRequest<'a> {
    token: &'a str,
    side: Side,
    amount_usd: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeResponse {
    tx_hash: Option<String>,
    token_amount: Option<f64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
}
