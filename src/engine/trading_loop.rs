use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, TradingSettings};
use crate::exchange::{ExecutorError, TradeExecutor};
use crate::patterns::{uniform, PricePatternGenerator, RandomSource, SeededRandom, ThreadRandom};
use crate::types::{BaseShift, Side, TradeDecision, TradeReceipt};
use super::retry::{policy_from_settings, FixedDelay, RetryPolicy};
use super::BotController;

const PAUSE_POLL: Duration = Duration::from_secs(1);

/// Failure inside a single trading cycle. Always retried by the loop.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("{side} of ${amount} failed: {source}")]
    Trade {
        side: Side,
        amount: Decimal,
        #[source]
        source: ExecutorError,
    },
    #[error("price query failed: {0}")]
    Price(#[source] ExecutorError),
    #[error("executor reported invalid price {0}")]
    InvalidPrice(f64),
    #[error("trade amount {0} cannot be represented")]
    InvalidAmount(f64),
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("executor initialization failed: {0}")]
    Startup(#[source] ExecutorError),
    #[error("initial market price {0} is not usable")]
    InvalidInitialPrice(f64),
    #[error("giving up after {attempts} consecutive failures, last: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Result of a successful cycle. `delay` is the wait before the next one.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub decision: TradeDecision,
    pub amount_usd: Decimal,
    pub receipt: TradeReceipt,
    pub price: f64,
    pub shift: Option<BaseShift>,
    pub delay: Duration,
}

/// Drives the decide → execute → observe → update → wait cycle until the
/// controller stops it. Cycle failures are logged and retried per the
/// configured [`RetryPolicy`].
pub struct TradingLoop {
    generator: PricePatternGenerator,
    executor: Arc<dyn TradeExecutor>,
    settings: TradingSettings,
    retry: Box<dyn RetryPolicy>,
    rng: Box<dyn RandomSource>,
    controller: Arc<BotController>,
    consecutive_failures: u32,
}

impl TradingLoop {
    pub fn new(
        generator: PricePatternGenerator,
        executor: Arc<dyn TradeExecutor>,
        settings: TradingSettings,
        controller: Arc<BotController>,
    ) -> Self {
        Self {
            generator,
            executor,
            settings,
            retry: Box::new(FixedDelay::default()),
            rng: Box::new(ThreadRandom),
            controller,
            consecutive_failures: 0,
        }
    }

    pub fn with_retry_policy(mut self, retry: Box<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// Initializes the executor and seeds the generator from the live price.
    /// Errors here are fatal and are not retried.
    pub async fn bootstrap(
        executor: Arc<dyn TradeExecutor>,
        config: &BotConfig,
        controller: Arc<BotController>,
        seed: Option<u64>,
    ) -> Result<Self, LoopError> {
        executor.initialize().await.map_err(LoopError::Startup)?;
        let initial_price = executor.get_current_price().await.map_err(LoopError::Startup)?;
        if !initial_price.is_finite() || initial_price <= 0.0 {
            return Err(LoopError::InvalidInitialPrice(initial_price));
        }

        let (pattern_rng, loop_rng): (Box<dyn RandomSource>, Box<dyn RandomSource>) = match seed {
            Some(seed) => (
                Box::new(SeededRandom::new(seed)),
                Box::new(SeededRandom::new(seed.wrapping_add(1))),
            ),
            None => (Box::new(ThreadRandom), Box::new(ThreadRandom)),
        };

        info!("Initial price: ${:.6}", initial_price);
        let generator = PricePatternGenerator::new(initial_price, config.pattern.clone(), pattern_rng);

        Ok(Self::new(generator, executor, config.trading.clone(), controller)
            .with_retry_policy(policy_from_settings(&config.retry))
            .with_random_source(loop_rng))
    }

    pub fn generator(&self) -> &PricePatternGenerator {
        &self.generator
    }

    /// Runs until the controller is stopped. Only returns an error when a
    /// bounded retry policy gives up.
    pub async fn run(&mut self) -> Result<(), LoopError> {
        info!(
            "Trading loop started: ${}-${} per trade, {}-{}ms between trades, retry {}",
            self.settings.min_trade_usd,
            self.settings.max_trade_usd,
            self.settings.min_interval_ms,
            self.settings.max_interval_ms,
            self.retry.describe()
        );

        while self.controller.is_running() {
            if !self.controller.should_trade() {
                self.controller.sleep(PAUSE_POLL).await;
                continue;
            }
            self.step().await?;
        }

        info!("Trading loop stopped");
        Ok(())
    }

    /// Attempts up to `cycles` cycles with the same retry handling as [`run`](Self::run).
    /// Returns how many completed successfully.
    pub async fn run_cycles(&mut self, cycles: u64) -> Result<u64, LoopError> {
        let mut completed = 0;
        for _ in 0..cycles {
            if !self.controller.is_running() {
                break;
            }
            if self.step().await? {
                completed += 1;
            }
        }
        Ok(completed)
    }

    async fn step(&mut self) -> Result<bool, LoopError> {
        match self.run_cycle().await {
            Ok(outcome) => {
                self.consecutive_failures = 0;
                if let Some(shift) = &outcome.shift {
                    info!("News event: {}", shift);
                }
                info!(
                    "{} ${} ({}) -> price ${:.6}, trend={:+.5}, momentum={:+.5}",
                    outcome.decision.side,
                    outcome.amount_usd,
                    outcome.receipt.reference(),
                    outcome.price,
                    self.generator.trend(),
                    self.generator.momentum()
                );

                debug!("Next trade in {:?}", outcome.delay);
                self.controller.sleep(outcome.delay).await;
                Ok(true)
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.controller.record_failure();
                error!("Trading cycle failed: {}", e);

                match self.retry.next_delay(self.consecutive_failures) {
                    Some(delay) => {
                        warn!("Retrying in {:?} (failure #{})", delay, self.consecutive_failures);
                        self.controller.sleep(delay).await;
                        Ok(false)
                    }
                    None => Err(LoopError::RetriesExhausted {
                        attempts: self.consecutive_failures,
                        last_error: e.to_string(),
                    }),
                }
            }
        }
    }

    /// Decides, trades, observes the new price and updates the model. The
    /// returned outcome carries the sampled wait; the caller does the waiting.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        self.controller.record_cycle();

        let decision = self.generator.next_trade();
        let amount_usd = self.amount_for(decision.size_multiplier)?;
        debug!(
            "Decision: {} x{:.3} (p_buy={:.3}, deviation={:+.4})",
            decision.side, decision.size_multiplier, decision.buy_probability, decision.deviation
        );

        let result = if decision.is_buy() {
            self.executor.buy(amount_usd).await
        } else {
            self.executor.sell(amount_usd).await
        };
        let receipt = result.map_err(|source| CycleError::Trade {
            side: decision.side,
            amount: amount_usd,
            source,
        })?;
        self.controller.record_trade(decision.side, amount_usd).await;

        let price = self.executor.get_current_price().await.map_err(CycleError::Price)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(CycleError::InvalidPrice(price));
        }
        self.generator.update_price(price);

        let shift = self.generator.maybe_shift_base();
        if shift.is_some() {
            self.controller.record_shift();
        }

        Ok(CycleOutcome {
            decision,
            amount_usd,
            receipt,
            price,
            shift,
            delay: self.sample_delay(),
        })
    }

    /// Whole-dollar trade amount: a uniform base amount scaled by `size_multiplier`.
    pub(crate) fn amount_for(&mut self, size_multiplier: f64) -> Result<Decimal, CycleError> {
        let base_amount = uniform(
            self.rng.as_mut(),
            self.settings.min_trade_usd,
            self.settings.max_trade_usd,
        );
        let amount = (base_amount * size_multiplier).round();
        Decimal::from_f64(amount).ok_or(CycleError::InvalidAmount(amount))
    }

    pub(crate) fn sample_delay(&mut self) -> Duration {
        let millis = uniform(
            self.rng.as_mut(),
            self.settings.min_interval_ms as f64,
            self.settings.max_interval_ms as f64,
        );
        Duration::from_millis(millis.floor() as u64)
    }
}
