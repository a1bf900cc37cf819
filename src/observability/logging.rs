//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Default filter directives for a configured level.
pub fn default_directives(level: &str) -> String {
    format!("ids_gate={level},security={level},tower_http={level}")
}

/// Install the global subscriber. Call once, from `main`.
pub fn init_tracing(config: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives(&config.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
