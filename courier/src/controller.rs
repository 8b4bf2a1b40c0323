use std::sync::LazyLock;

use serde::Deserialize;
use tokio::sync::broadcast;

use courier_common::{Signal, internal, logging};
use courier_delivery::{
    ConnectivityConfig, ConnectivityMonitor, DeliveryEngine, EngineConfig, TransportConfig,
};
use courier_store::StoreConfig;

/// The root of a courier deployment, deserialized straight from the
/// configuration file.
///
/// ```ron
/// #![enable(unwrap_variant_newtypes)]
/// Courier(
///     store: File(
///         path: "/var/spool/courier",
///     ),
///     transport: Webhook(
///         url: "https://hooks.example.com/ingest",
///         api_key: "${API_KEY}",
///     ),
///     engine: (
///         drain_interval_secs: 30,
///     ),
/// )
/// ```
#[derive(Deserialize)]
pub struct Courier {
    store: StoreConfig,
    transport: TransportConfig,
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    connectivity: Option<ConnectivityConfig>,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(signal) => internal!(level = DEBUG, "Received {signal:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => internal!(level = DEBUG, "Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

/// Keeps the monitor arm of the select inert when no connectivity
/// section is configured.
async fn watch_connectivity(monitor: Option<&ConnectivityMonitor>) -> anyhow::Result<()> {
    match monitor {
        Some(monitor) => monitor
            .serve(SHUTDOWN_BROADCAST.subscribe())
            .await
            .map_err(Into::into),
        None => std::future::pending().await,
    }
}

impl Courier {
    /// Check the configuration without starting anything.
    ///
    /// Builds the transport and probe clients, so a configuration that
    /// passes here will also construct at startup.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting found.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.engine.validate()?;
        self.transport.clone().into_transport()?;

        if let Some(connectivity) = &self.connectivity {
            connectivity.clone().into_monitor()?;
        }

        Ok(())
    }

    /// Run this deployment, and everything it controls
    ///
    /// # Errors
    ///
    /// This function will return an error if the store cannot be
    /// initialised, the transport cannot be constructed, or the delivery
    /// engine stops with an error.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        self.engine.validate()?;

        let store = self.store.into_store()?;
        let transport = self.transport.into_transport()?;
        let monitor = self
            .connectivity
            .map(ConnectivityConfig::into_monitor)
            .transpose()?;

        let engine = DeliveryEngine::new(store, transport, self.engine);
        let engine = match &monitor {
            Some(monitor) => engine.with_connectivity(monitor.subscribe()),
            None => engine,
        };

        internal!("Controller running");

        let ret = tokio::select! {
            r = engine.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(Into::into)
            }
            r = watch_connectivity(monitor.as_ref()) => {
                r
            }
            r = shutdown() => {
                r
            }
        };

        internal!("Shutting down...");

        ret
    }
}
