pub mod logging;

pub use tracing;

/// Control-plane notification broadcast from the composition root to every
/// long-running serve loop.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
