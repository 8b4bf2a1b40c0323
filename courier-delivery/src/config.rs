//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

use crate::{error::DeliveryError, policy::RetryPolicy};

/// Settings for the drain loop. Every field has a default, so an empty
/// config section is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between periodic drain passes
    #[serde(default = "defaults::drain_interval_secs")]
    pub drain_interval_secs: u64,

    /// Nudge the drain loop as soon as an item is enqueued
    #[serde(default = "defaults::drain_on_enqueue")]
    pub drain_on_enqueue: bool,

    /// How long shutdown waits for an in-flight drain pass, in seconds
    #[serde(default = "defaults::shutdown_wait_secs")]
    pub shutdown_wait_secs: u64,

    /// Retry budget and delay curve for failed deliveries
    #[serde(default)]
    pub retry: RetryPolicy,
}

mod defaults {
    pub(super) const fn drain_interval_secs() -> u64 {
        30
    }

    pub(super) const fn drain_on_enqueue() -> bool {
        true
    }

    pub(super) const fn shutdown_wait_secs() -> u64 {
        30
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            drain_interval_secs: defaults::drain_interval_secs(),
            drain_on_enqueue: defaults::drain_on_enqueue(),
            shutdown_wait_secs: defaults::shutdown_wait_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`] when a field is outside its
    /// usable range.
    pub fn validate(&self) -> crate::Result<()> {
        if self.drain_interval_secs == 0 {
            return Err(DeliveryError::Config(
                "drain_interval_secs must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(DeliveryError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.drain_interval_secs, 30);
        assert!(config.drain_on_enqueue);
        assert_eq!(config.shutdown_wait_secs, 30);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_section_parses() {
        let config: EngineConfig = ron::from_str("()").expect("empty config should parse");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_remaining_defaults() {
        let config: EngineConfig =
            ron::from_str("(drain_interval_secs: 5, retry: (max_attempts: 10))")
                .expect("partial config should parse");

        assert_eq!(config.drain_interval_secs, 5);
        assert_eq!(config.retry.max_attempts, 10);
        assert!(config.drain_on_enqueue);
        assert_eq!(config.retry.base_delay_secs, 30);
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let config = EngineConfig {
            drain_interval_secs: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let mut config = EngineConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
