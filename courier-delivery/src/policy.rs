//! Retry policy for failed deliveries.
//!
//! One policy covers both deployment profiles: clients typically run a
//! fixed delay between attempts while servers back off exponentially with
//! a cap. The strategy is plain configuration, everything else about the
//! budget is shared.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryStrategy {
    /// Same delay after every failure
    Fixed,
    /// Delay doubles with each failure, up to a cap
    #[default]
    Exponential,
}

/// Bounded retry budget with a configurable delay curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay curve between attempts
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Total attempts an item gets before it is dead-lettered
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failure, in seconds
    #[serde(default = "defaults::base_delay_secs")]
    pub base_delay_secs: u64,

    /// Upper bound for the exponential curve, in seconds
    #[serde(default = "defaults::max_delay_secs")]
    pub max_delay_secs: u64,

    /// Random variation applied to exponential delays, as a fraction
    /// of the delay (0.1 = plus or minus 10%)
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

mod defaults {
    pub(super) const fn max_attempts() -> u32 {
        3
    }

    pub(super) const fn base_delay_secs() -> u64 {
        30
    }

    pub(super) const fn max_delay_secs() -> u64 {
        60
    }

    pub(super) const fn jitter_factor() -> f64 {
        0.1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::default(),
            max_attempts: defaults::max_attempts(),
            base_delay_secs: defaults::base_delay_secs(),
            max_delay_secs: defaults::max_delay_secs(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Whether an item with `attempt_count` recorded failures still has
    /// budget for another attempt.
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }

    /// Attempts left before the item is dead-lettered.
    #[must_use]
    pub const fn remaining_attempts(&self, attempt_count: u32) -> u32 {
        self.max_attempts.saturating_sub(attempt_count)
    }

    /// Whether the next attempt is the last one in the budget.
    #[must_use]
    pub const fn is_final_attempt(&self, attempt_count: u32) -> bool {
        attempt_count.saturating_add(1) >= self.max_attempts
    }

    /// Delay before the next attempt, given `attempt_count` failures so
    /// far. `attempt_count` is 1-based: pass the count recorded after the
    /// failure being handled.
    #[must_use]
    pub fn next_delay(&self, attempt_count: u32) -> std::time::Duration {
        let secs = match self.strategy {
            RetryStrategy::Fixed => self.base_delay_secs,
            RetryStrategy::Exponential => backoff_delay_secs(
                attempt_count,
                self.base_delay_secs,
                self.max_delay_secs,
                self.jitter_factor,
            ),
        };

        std::time::Duration::from_secs(secs)
    }

    /// Wall-clock instant at which the item becomes due again.
    #[must_use]
    pub fn next_attempt_at(&self, attempt_count: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay =
            TimeDelta::from_std(self.next_delay(attempt_count)).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Exponential backoff with a cap and optional jitter.
///
/// The first retry waits `base_delay`, then the delay doubles per failure
/// until it saturates at `max_delay`.
fn backoff_delay_secs(
    attempt_count: u32,
    base_delay: u64,
    max_delay: u64,
    jitter_factor: f64,
) -> u64 {
    let exponent = attempt_count.saturating_sub(1);
    let delay_secs = if exponent >= 63 {
        max_delay
    } else {
        let multiplier = 1u64 << exponent;
        base_delay.saturating_mul(multiplier).min(max_delay)
    };

    if jitter_factor > 0.0 {
        #[allow(clippy::cast_precision_loss)]
        let jitter_range = delay_secs as f64 * jitter_factor;
        let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            ((delay_secs as f64) + jitter).max(0.0) as u64
        }
    } else {
        delay_secs
    }
}
