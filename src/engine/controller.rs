use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use crate::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotStatus {
    Running,
    Paused,
    Stopped,
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotStatus::Running => write!(f, "Running"),
            BotStatus::Paused => write!(f, "Paused"),
            BotStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BotState {
    pub status: BotStatus,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
    pub cycles: u64,
    pub buys: u64,
    pub sells: u64,
    pub failures: u64,
    pub base_shifts: u64,
    pub volume_usd: Decimal,
}

impl std::fmt::Display for BotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Status:      {}", self.status)?;
        writeln!(f, "Uptime:      {}s", self.uptime_seconds)?;
        writeln!(f, "Cycles:      {}", self.cycles)?;
        writeln!(f, "Trades:      {} buys / {} sells", self.buys, self.sells)?;
        writeln!(f, "Volume:      ${:.2}", self.volume_usd)?;
        writeln!(f, "Failures:    {}", self.failures)?;
        write!(f, "Base shifts: {}", self.base_shifts)
    }
}

/// Run state and counters shared between the trading loop and the process
/// that owns it.
pub struct BotController {
    is_running: AtomicBool,
    is_paused: AtomicBool,
    started_at: DateTime<Utc>,
    paused_at: RwLock<Option<DateTime<Utc>>>,
    cycles: AtomicU64,
    buys: AtomicU64,
    sells: AtomicU64,
    failures: AtomicU64,
    base_shifts: AtomicU64,
    volume_usd: RwLock<Decimal>,
    status_tx: broadcast::Sender<BotStatus>,
}

impl BotController {
    pub fn new_running() -> Self {
        let (status_tx, _) = broadcast::channel(32);
        Self {
            is_running: AtomicBool::new(true),
            is_paused: AtomicBool::new(false),
            started_at: Utc::now(),
            paused_at: RwLock::new(None),
            cycles: AtomicU64::new(0),
            buys: AtomicU64::new(0),
            sells: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            base_shifts: AtomicU64::new(0),
            volume_usd: RwLock::new(Decimal::ZERO),
            status_tx,
        }
    }

    pub async fn stop(&self) -> Result<(), String> {
        if !self.is_running.load(Ordering::Acquire) {
            return Err("Bot is not running".to_string());
        }

        self.is_running.store(false, Ordering::Release);
        self.is_paused.store(false, Ordering::Release);
        *self.paused_at.write().await = None;

        info!("Bot stopped");
        let _ = self.status_tx.send(BotStatus::Stopped);
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), String> {
        if !self.is_running.load(Ordering::Acquire) {
            return Err("Bot is not running".to_string());
        }
        if self.is_paused.load(Ordering::Acquire) {
            return Err("Bot is already paused".to_string());
        }

        self.is_paused.store(true, Ordering::Release);
        *self.paused_at.write().await = Some(Utc::now());

        info!("Bot paused");
        let _ = self.status_tx.send(BotStatus::Paused);
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), String> {
        if !self.is_running.load(Ordering::Acquire) {
            return Err("Bot is not running".to_string());
        }
        if !self.is_paused.load(Ordering::Acquire) {
            return Err("Bot is not paused".to_string());
        }

        self.is_paused.store(false, Ordering::Release);
        *self.paused_at.write().await = None;

        info!("Bot resumed");
        let _ = self.status_tx.send(BotStatus::Running);
        Ok(())
    }

    /// Pauses a running bot or resumes a paused one, returning the new status.
    pub async fn toggle_pause(&self) -> Result<BotStatus, String> {
        if self.is_paused() {
            self.resume().await?;
            Ok(BotStatus::Running)
        } else {
            self.pause().await?;
            Ok(BotStatus::Paused)
        }
    }

    pub fn should_trade(&self) -> bool {
        self.is_running.load(Ordering::Acquire) && !self.is_paused.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::Acquire)
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_trade(&self, side: Side, amount_usd: Decimal) {
        match side {
            Side::Buy => self.buys.fetch_add(1, Ordering::Relaxed),
            Side::Sell => self.sells.fetch_add(1, Ordering::Relaxed),
        };
        *self.volume_usd.write().await += amount_usd;
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shift(&self) {
        self.base_shifts.fetch_add(1, Ordering::Relaxed);
    }

    /// Sleeps for `duration` unless the bot is stopped first.
    /// Returns whether the bot is still running afterwards.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut status_rx = self.subscribe();
        if !self.is_running() {
            return false;
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return self.is_running(),
                status = status_rx.recv() => match status {
                    Ok(BotStatus::Stopped) => return false,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        (&mut sleep).await;
                        return self.is_running();
                    }
                },
            }
        }
    }

    pub async fn get_state(&self) -> BotState {
        let started_at = self.started_at;
        let paused_at = *self.paused_at.read().await;

        let status = if !self.is_running.load(Ordering::Acquire) {
            BotStatus::Stopped
        } else if self.is_paused.load(Ordering::Acquire) {
            BotStatus::Paused
        } else {
            BotStatus::Running
        };

        let uptime_seconds = (Utc::now() - started_at).num_seconds().max(0) as u64;

        BotState {
            status,
            started_at,
            paused_at,
            uptime_seconds,
            cycles: self.cycles.load(Ordering::Relaxed),
            buys: self.buys.load(Ordering::Relaxed),
            sells: self.sells.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            base_shifts: self.base_shifts.load(Ordering::Relaxed),
            volume_usd: *self.volume_usd.read().await,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotStatus> {
        self.status_tx.subscribe()
    }
}
