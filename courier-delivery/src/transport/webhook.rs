//! Server-profile transport: fan events out to a subscriber webhook.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

use courier_store::QueueItem;

use crate::{
    error::{DeliveryError, TransportError},
    transport::DeliveryTransport,
};

/// Event name used for reachability probes. Subscribers are expected to
/// acknowledge it without acting on it.
const PROBE_EVENT: &str = "connection.test";

/// POSTs `{event, timestamp, data}` envelopes to a single endpoint,
/// authenticated by a shared API key.
#[derive(Debug)]
pub struct WebhookTransport {
    url: String,
    api_key: HeaderValue,
    client: reqwest::Client,
}

impl WebhookTransport {
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`] when the API key is not a valid
    /// header value or the HTTP client cannot be constructed.
    pub fn new(
        url: impl Into<String>,
        api_key: impl AsRef<str>,
        timeout_secs: u64,
    ) -> crate::Result<Self> {
        let mut api_key = HeaderValue::from_str(api_key.as_ref())
            .map_err(|_| DeliveryError::Config("API key is not a valid header value".to_string()))?;
        api_key.set_sensitive(true);

        Ok(Self {
            url: url.into(),
            api_key,
            client: super::build_client(timeout_secs)?,
        })
    }

    /// Probe the endpoint with a no-op event. Any 2xx answer counts as
    /// reachable.
    pub async fn test_connectivity(&self) -> bool {
        let envelope = serde_json::json!({
            "event": PROBE_EVENT,
            "timestamp": Utc::now().to_rfc3339(),
            "data": {},
        });

        match self
            .client
            .post(&self.url)
            .headers(self.headers(PROBE_EVENT))
            .json(&envelope)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// The envelope's `timestamp` is the capture time. Dispatch time goes
    /// in the `X-Timestamp` header instead.
    fn envelope(item: &QueueItem) -> Result<Value, TransportError> {
        let data = item
            .payload_value()
            .map_err(|e| TransportError::InvalidPayload(e.to_string()))?;

        Ok(serde_json::json!({
            "event": item.kind,
            "timestamp": item.created_at.to_rfc3339(),
            "data": data,
        }))
    }

    fn headers(&self, event: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("X-API-Key", self.api_key.clone());
        if let Ok(v) = event.parse() {
            headers.insert("X-Event-Type", v);
        }
        if let Ok(v) = Utc::now().to_rfc3339().parse() {
            headers.insert("X-Timestamp", v);
        }
        headers
    }
}

#[async_trait]
impl DeliveryTransport for WebhookTransport {
    async fn deliver(&self, item: &QueueItem) -> Result<(), TransportError> {
        let envelope = Self::envelope(item)?;

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers(&item.kind))
            .json(&envelope)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::from_status(status.as_u16()))
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
