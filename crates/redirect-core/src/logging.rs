//! Logging configuration and tracing initialization.

use std::io;

use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging settings shared by the server and client binaries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level / filter in `EnvFilter` syntax. Defaults to "info".
    pub level: Option<String>,

    /// Output format: "pretty" (default), "compact", or "json".
    pub format: Option<String>,
}

/// Initialize the global tracing subscriber from config.
pub fn init_tracing(config: &LoggingConfig) {
    let level = config.level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.format.as_deref().unwrap_or("pretty") {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}
