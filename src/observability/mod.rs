pub mod log;
pub mod noop;
pub mod traits;

pub use self::log::LogObserver;
pub use noop::NoopObserver;
pub use traits::{Observer, ObserverEvent};

use crate::config::ObservabilityConfig;
use std::str::FromStr;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global `tracing` subscriber. A second call is a no-op.
pub fn init(config: &ObservabilityConfig) {
    let level = Level::from_str(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Factory: create the event sink named by config
pub fn create_observer(config: &ObservabilityConfig) -> Arc<dyn Observer> {
    match config.backend.as_str() {
        "log" => Arc::new(LogObserver::new()),
        "none" | "noop" => Arc::new(NoopObserver),
        _ => {
            tracing::warn!(
                "Unknown observability backend '{}', falling back to log",
                config.backend
            );
            Arc::new(LogObserver::new())
        }
    }
}
