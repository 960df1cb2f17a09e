//! Structured logging initialization.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber. `RUST_LOG` wins when set; otherwise
/// the whole gateway logs at `info`. Must run before the first request.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gauntlet=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
