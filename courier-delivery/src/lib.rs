//! Delivery engine for the courier durable queue
//!
//! This crate provides the machinery between a persistent queue and the
//! network:
//! - A drain loop that dispatches queued items sequentially
//! - Retry scheduling with fixed or capped-exponential delays
//! - Dead-lettering for items that exhaust their budget
//! - HTTP transports for the client-sync and webhook profiles
//! - Connectivity monitoring for deployments that go offline

mod config;
mod connectivity;
mod engine;
mod error;
mod event;
mod metrics;
mod policy;
mod transport;

// Re-export engine types
pub use config::EngineConfig;
pub use engine::DeliveryEngine;
// Re-export connectivity types
pub use connectivity::{ConnectivityConfig, ConnectivityMonitor, HttpProbe, ReachabilityProbe};
// Re-export error types
pub use error::{DeliveryError, Result, TransportError};
// Re-export event types
pub use event::{DeadLetter, DeadLetterReason, DrainReport, DrainTrigger};
// Re-export metrics types
pub use metrics::{EngineMetrics, MetricsSnapshot};
// Re-export retry policy types
pub use policy::{RetryPolicy, RetryStrategy};
// Re-export transport types
pub use transport::{
    DeliveryTransport, RouteTable, SyncTransport, TransportConfig, WebhookTransport,
};
