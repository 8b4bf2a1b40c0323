//! Client-profile transport: sync captured records to the backend API.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use courier_store::QueueItem;

use crate::{error::TransportError, transport::DeliveryTransport};

/// Marker header telling the backend this record arrives via the offline
/// queue rather than an interactive request.
const OFFLINE_SYNC_HEADER: &str = "X-Offline-Sync";

/// Catch-all route for kinds without a dedicated endpoint.
const DEFAULT_ROUTE: &str = "/api/sync";

/// Maps an item kind to the backend path it is posted to.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<String, String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        let routes = [
            ("vitals", "/api/vitals"),
            ("patient", "/api/patients"),
            ("notes", "/api/notes"),
            ("case", "/api/cases"),
        ]
        .into_iter()
        .map(|(kind, path)| (kind.to_string(), path.to_string()))
        .collect();

        Self { routes }
    }
}

impl RouteTable {
    /// Built-in routes extended or overridden by configuration.
    #[must_use]
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        let mut table = Self::default();
        table.routes.extend(overrides);
        table
    }

    /// Path for `kind`, falling back to the catch-all sync route.
    #[must_use]
    pub fn resolve(&self, kind: &str) -> &str {
        self.routes.get(kind).map_or(DEFAULT_ROUTE, String::as_str)
    }
}

/// POSTs each item to its per-kind route with an offline marker.
#[derive(Debug)]
pub struct SyncTransport {
    base_url: String,
    routes: RouteTable,
    client: reqwest::Client,
}

impl SyncTransport {
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`](crate::DeliveryError::Config) when
    /// the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        routes: HashMap<String, String>,
        timeout_secs: u64,
    ) -> crate::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            routes: RouteTable::with_overrides(routes),
            client: super::build_client(timeout_secs)?,
        })
    }

    /// Original payload with the capture time merged in, so the backend
    /// can distinguish capture time from arrival time.
    fn shape_body(item: &QueueItem) -> Result<Value, TransportError> {
        let payload = item
            .payload_value()
            .map_err(|e| TransportError::InvalidPayload(e.to_string()))?;
        let stamp = Value::String(item.created_at.to_rfc3339());

        // Scalar and array payloads get wrapped so the timestamp has
        // somewhere to live.
        Ok(match payload {
            Value::Object(mut map) => {
                map.insert("offlineTimestamp".to_string(), stamp);
                Value::Object(map)
            }
            other => {
                let mut map = serde_json::Map::new();
                map.insert("payload".to_string(), other);
                map.insert("offlineTimestamp".to_string(), stamp);
                Value::Object(map)
            }
        })
    }
}

#[async_trait]
impl DeliveryTransport for SyncTransport {
    async fn deliver(&self, item: &QueueItem) -> Result<(), TransportError> {
        let url = format!("{}{}", self.base_url, self.routes.resolve(&item.kind));
        let body = Self::shape_body(item)?;

        let response = self
            .client
            .post(&url)
            .header(OFFLINE_SYNC_HEADER, "true")
            .json(&body)
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
        "sync"
    }
}
