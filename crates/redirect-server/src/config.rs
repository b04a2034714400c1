//! Server configuration.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use redirect_core::defaults;
use redirect_core::logging::LoggingConfig;
use redirect_core::registry::{ChannelRegistry, Target};

use crate::error::ServerError;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub server: ServerSettings,

    /// Channel table: each entry maps a channel id to a destination.
    #[serde(default)]
    pub targets: Vec<Target>,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Listen address (ip:port). Use "0.0.0.0:<port>" for wildcard.
    pub listen: String,

    /// TCP listener backlog.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

/// Timeout settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Handshake deadline in seconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Outbound connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_backlog() -> u32 {
    defaults::DEFAULT_LISTEN_BACKLOG
}
fn default_handshake_timeout() -> u64 {
    defaults::DEFAULT_HANDSHAKE_TIMEOUT_SECS
}
fn default_connect_timeout() -> u64 {
    defaults::DEFAULT_CONNECT_TIMEOUT_SECS
}

/// Load server configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ServerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ServerError::Config(format!("failed to read config: {e}")))?;
    toml::from_str(&content).map_err(|e| ServerError::Config(format!("TOML parse error: {e}")))
}

/// Build the channel registry from the configured target table.
///
/// Channel ids are case-normalized to uppercase; empty channels/hosts,
/// port 0, and duplicate channel ids are rejected.
pub fn build_registry(targets: &[Target]) -> Result<Arc<ChannelRegistry>, ServerError> {
    let registry = ChannelRegistry::new();
    for target in targets {
        let channel = target.channel.trim().to_uppercase();
        if channel.is_empty() {
            return Err(ServerError::Config("empty channel id in target".into()));
        }
        let host = target.host.trim().to_string();
        if host.is_empty() {
            return Err(ServerError::Config(format!(
                "empty host for channel {channel}"
            )));
        }
        if target.port == 0 {
            return Err(ServerError::Config(format!(
                "invalid port for channel {channel}"
            )));
        }
        let target = Target {
            channel,
            host,
            port: target.port,
        };
        tracing::info!(channel = %target, "added target");
        registry.add(target)?;
    }
    Ok(Arc::new(registry))
}
