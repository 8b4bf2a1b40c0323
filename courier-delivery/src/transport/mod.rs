//! Transports carry queue items to their destination.
//!
//! The engine only knows the [`DeliveryTransport`] contract. The two
//! built-in implementations cover the supported deployment profiles: a
//! client syncing captured records to its backend, and a server fanning
//! events out to a subscriber webhook.

mod sync;
mod webhook;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use courier_store::QueueItem;

use crate::error::{DeliveryError, TransportError};

pub use sync::{RouteTable, SyncTransport};
pub use webhook::WebhookTransport;

/// A single delivery attempt for a single item.
///
/// Implementations must bound every attempt with a timeout so a dead
/// endpoint cannot stall the drain loop. The HTTP transports inherit the
/// bound from their client configuration.
#[async_trait]
pub trait DeliveryTransport: std::fmt::Debug + Send + Sync {
    /// Attempt to hand `item` to the destination.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] describing the failure. Its
    /// [`is_retryable`](TransportError::is_retryable) classification
    /// decides whether the engine reschedules or dead-letters the item.
    async fn deliver(&self, item: &QueueItem) -> Result<(), TransportError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Transport selection, deserialized from the `transport` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportConfig {
    /// Client profile: POST items to per-kind routes on a backend
    Sync {
        base_url: String,
        /// Additional or overriding kind-to-path routes
        #[serde(default)]
        routes: HashMap<String, String>,
        #[serde(default = "defaults::timeout_secs")]
        timeout_secs: u64,
    },
    /// Server profile: POST event envelopes to a subscriber endpoint
    Webhook {
        url: String,
        api_key: String,
        #[serde(default = "defaults::timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "defaults::enabled")]
        enabled: bool,
    },
}

mod defaults {
    pub(super) const fn timeout_secs() -> u64 {
        10
    }

    pub(super) const fn enabled() -> bool {
        true
    }
}

impl TransportConfig {
    /// Build the configured transport.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`] when the timeout is out of range,
    /// the webhook is disabled, or the HTTP client cannot be constructed.
    pub fn into_transport(self) -> crate::Result<Arc<dyn DeliveryTransport>> {
        match self {
            Self::Sync {
                base_url,
                routes,
                timeout_secs,
            } => {
                validate_timeout(timeout_secs)?;
                Ok(Arc::new(SyncTransport::new(base_url, routes, timeout_secs)?))
            }
            Self::Webhook {
                url,
                api_key,
                timeout_secs,
                enabled,
            } => {
                if !enabled {
                    return Err(DeliveryError::Config(
                        "Webhook transport is disabled".to_string(),
                    ));
                }
                validate_timeout(timeout_secs)?;
                Ok(Arc::new(WebhookTransport::new(url, api_key, timeout_secs)?))
            }
        }
    }
}

fn validate_timeout(timeout_secs: u64) -> crate::Result<()> {
    if (1..=300).contains(&timeout_secs) {
        Ok(())
    } else {
        Err(DeliveryError::Config(format!(
            "timeout_secs must be between 1 and 300, got {timeout_secs}"
        )))
    }
}

/// Shared client settings for both HTTP transports.
///
/// Redirects are disabled: a redirect from a configured endpoint is a
/// configuration problem, not something to follow silently.
pub(crate) fn build_client(timeout_secs: u64) -> crate::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| DeliveryError::Config(format!("Failed to build HTTP client: {e}")))
}
