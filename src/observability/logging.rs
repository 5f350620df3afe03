//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Pick the level from `RUST_LOG`, falling back to the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ObservabilityConfig;

/// Install the global tracing subscriber.
pub fn init(config: &ObservabilityConfig) {
    let fallback = format!("lb_gateway={level},tower_http={level}", level = config.log_level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
