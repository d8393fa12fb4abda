use std::time::Duration;

use crate::config::{RetrySettings, RetryStrategy};

/// Decides how long to pause after a failed trading cycle, or whether to give up.
pub trait RetryPolicy: Send + Sync {
    /// `consecutive_failures` counts the failure that just happened, so it is at least 1.
    /// `None` means stop retrying.
    fn next_delay(&self, consecutive_failures: u32) -> Option<Duration>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn forever(delay: Duration) -> Self {
        Self { delay, max_attempts: None }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::forever(Duration::from_secs(10))
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, consecutive_failures: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if consecutive_failures >= max => None,
            _ => Some(self.delay),
        }
    }

    fn describe(&self) -> String {
        match self.max_attempts {
            Some(max) => format!("fixed {:?}, up to {} attempts", self.delay, max),
            None => format!("fixed {:?}, unlimited attempts", self.delay),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, consecutive_failures: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if consecutive_failures >= max {
                return None;
            }
        }

        let exponent = consecutive_failures.saturating_sub(1).min(64) as i32;
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max.as_secs_f64());
        // Past u64::MAX seconds the float no longer fits a Duration.
        Some(Duration::try_from_secs_f64(capped).unwrap_or(self.max))
    }

    fn describe(&self) -> String {
        format!(
            "exponential from {:?} x{} capped at {:?}",
            self.initial, self.multiplier, self.max
        )
    }
}

pub fn policy_from_settings(settings: &RetrySettings) -> Box<dyn RetryPolicy> {
    match settings.strategy {
        RetryStrategy::Fixed => Box::new(FixedDelay {
            delay: settings.cooldown(),
            max_attempts: settings.max_attempts,
        }),
        RetryStrategy::Exponential => Box::new(ExponentialBackoff {
            initial: settings.cooldown(),
            max: settings.max_delay(),
            multiplier: settings.multiplier,
            max_attempts: settings.max_attempts,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fixed_delay_never_gives_up() {
        let policy = FixedDelay::default();
        for failures in [1, 2, 100, u32::MAX] {
            assert_eq!(policy.next_delay(failures), Some(Duration::from_secs(10)));
        }
    }

    #[test]
    fn test_capped_fixed_delay() {
        let policy = FixedDelay { delay: Duration::from_secs(1), max_attempts: Some(3) };
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(3), None);
    }

    #[test]
    fn test_exponential_backoff_grows_and_caps() {
        let policy = ExponentialBackoff {
            initial: Duration::from_secs(10),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: None,
        };
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(20)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_secs(40)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_secs(60)));
        assert_eq!(policy.next_delay(1000), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_uncapped_backoff_saturates_at_max() {
        let settings = RetrySettings {
            strategy: RetryStrategy::Exponential,
            max_delay_secs: u64::MAX,
            ..RetrySettings::default()
        };
        let policy = policy_from_settings(&settings);

        let mut previous = Duration::ZERO;
        for failures in 1..=80 {
            let delay = policy.next_delay(failures).unwrap();
            assert!(delay >= previous);
            previous = delay;
        }
        assert_eq!(previous, settings.max_delay());
        assert_eq!(policy.next_delay(u32::MAX), Some(settings.max_delay()));
    }

    #[test]
    fn test_policy_from_default_settings() {
        let policy = policy_from_settings(&RetrySettings::default());
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_delay(10_000), Some(Duration::from_secs(10)));
        assert!(policy.describe().contains("unlimited"));
    }
}
