//! Reachability monitoring for client deployments.
//!
//! Devices in the field drop offline constantly. The monitor polls a probe
//! endpoint and publishes the current state on a watch channel; the engine
//! treats the offline-to-online edge as a drain trigger. Server deployments
//! simply never construct one.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::debug;

use courier_common::{Signal, internal};

/// A single reachability check. `true` means the backend is reachable.
#[async_trait]
pub trait ReachabilityProbe: std::fmt::Debug + Send + Sync {
    async fn check(&self) -> bool;
}

/// Probes with a GET against a cheap endpoint, typically a health route.
///
/// Redirects count as reachable: the point is "can we reach the backend",
/// not "is this route correct".
#[derive(Debug)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`](crate::DeliveryError::Config) when
    /// the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> crate::Result<Self> {
        Ok(Self {
            url: url.into(),
            client: crate::transport::build_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn check(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let status = response.status();
                status.is_success() || status.is_redirection()
            }
            Err(error) => {
                debug!("Probe request to {} failed: {error}", self.url);
                false
            }
        }
    }
}

/// Monitor settings, deserialized from the `connectivity` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Endpoint polled to decide whether the backend is reachable
    pub url: String,

    /// Seconds between probes
    #[serde(default = "defaults::interval_secs")]
    pub interval_secs: u64,

    /// Per-probe timeout in seconds
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

mod defaults {
    pub(super) const fn interval_secs() -> u64 {
        15
    }

    pub(super) const fn timeout_secs() -> u64 {
        5
    }
}

impl ConnectivityConfig {
    /// Build a monitor backed by an [`HttpProbe`].
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`](crate::DeliveryError::Config) when
    /// the probe client cannot be constructed.
    pub fn into_monitor(self) -> crate::Result<ConnectivityMonitor> {
        let probe = HttpProbe::new(self.url, self.timeout_secs)?;
        Ok(ConnectivityMonitor::new(
            Arc::new(probe),
            Duration::from_secs(self.interval_secs.max(1)),
        ))
    }
}

/// Polls a [`ReachabilityProbe`] and publishes state transitions.
///
/// Subscribers see the current state immediately and are woken only when
/// it flips, so the offline-to-online edge can be consumed as an event.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Starts optimistic: the state reads online until the first probe
    /// says otherwise, so a healthy start does not produce a spurious
    /// restored edge.
    #[must_use]
    pub fn new(probe: Arc<dyn ReachabilityProbe>, interval: Duration) -> Self {
        let (state, _) = watch::channel(true);

        Self {
            probe,
            interval,
            state,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Poll the probe until shutdown. The first probe runs immediately.
    ///
    /// # Errors
    ///
    /// Currently infallible; the signature leaves room for probes that can
    /// fail fatally.
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) -> crate::Result<()> {
        let mut timer = tokio::time::interval(self.interval);

        internal!(
            level = INFO,
            "Connectivity monitor started ({}s interval)",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let up = self.probe.check().await;
                    let was = *self.state.borrow();

                    if up != was {
                        internal!(
                            level = INFO,
                            "Connectivity changed: {}",
                            if up { "online" } else { "offline" }
                        );
                        let _ = self.state.send(up);
                    }
                }

                Ok(signal) = shutdown.recv() => {
                    internal!(level = INFO, "Connectivity monitor received signal: {signal:?}");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Debug)]
    struct FlagProbe {
        up: AtomicBool,
    }

    impl FlagProbe {
        fn new(up: bool) -> Arc<Self> {
            Arc::new(Self {
                up: AtomicBool::new(up),
            })
        }

        fn set(&self, up: bool) {
            self.up.store(up, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ReachabilityProbe for FlagProbe {
        async fn check(&self) -> bool {
            self.up.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_config_defaults() {
        let config: ConnectivityConfig =
            ron::from_str(r#"(url: "https://api.example.com/health")"#)
                .expect("config should parse");

        assert_eq!(config.interval_secs, 15);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_monitor_starts_online() {
        let monitor = ConnectivityMonitor::new(FlagProbe::new(false), Duration::from_secs(15));
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_monitor_publishes_transitions() {
        let probe = FlagProbe::new(false);
        let monitor = Arc::new(ConnectivityMonitor::new(
            probe.clone(),
            Duration::from_millis(10),
        ));
        let mut state = monitor.subscribe();
        let (shutdown_tx, _) = broadcast::channel(1);

        let serve_monitor = Arc::clone(&monitor);
        let serve_shutdown = shutdown_tx.subscribe();
        let handle = tokio::spawn(async move { serve_monitor.serve(serve_shutdown).await });

        // First probe reports offline
        tokio::time::timeout(Duration::from_secs(1), state.changed())
            .await
            .expect("offline transition should arrive")
            .expect("monitor should stay alive");
        assert!(!*state.borrow_and_update());

        // Back online
        probe.set(true);
        tokio::time::timeout(Duration::from_secs(1), state.changed())
            .await
            .expect("online transition should arrive")
            .expect("monitor should stay alive");
        assert!(*state.borrow_and_update());

        shutdown_tx
            .send(Signal::Shutdown)
            .expect("shutdown should send");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("serve should stop")
            .expect("serve task should not panic")
            .expect("serve should return cleanly");
    }

    #[tokio::test]
    async fn test_steady_state_produces_no_events() {
        let probe = FlagProbe::new(true);
        let monitor = Arc::new(ConnectivityMonitor::new(
            probe,
            Duration::from_millis(10),
        ));
        let mut state = monitor.subscribe();
        let (shutdown_tx, _) = broadcast::channel(1);

        let serve_monitor = Arc::clone(&monitor);
        let serve_shutdown = shutdown_tx.subscribe();
        let handle = tokio::spawn(async move { serve_monitor.serve(serve_shutdown).await });

        // Several probe cycles pass without the state flipping
        let waited = tokio::time::timeout(Duration::from_millis(100), state.changed()).await;
        assert!(waited.is_err(), "no transition should be published");

        shutdown_tx
            .send(Signal::Shutdown)
            .expect("shutdown should send");
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
}
