//! Client configuration.

use std::path::Path;

use serde::Deserialize;

use redirect_core::defaults;
use redirect_core::logging::LoggingConfig;

use crate::error::ClientError;

/// Top-level client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client: ClientSettings,

    /// Channel bindings: one local listener per entry.
    #[serde(default)]
    pub channels: Vec<ChannelBinding>,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Core client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    /// Relay server address, e.g. "relay.example.com:8080".
    pub remote: String,
}

/// One channel exposed on a local port.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelBinding {
    /// Channel id, as registered on the relay server.
    pub channel: String,

    /// Local listen address (ip:port).
    pub listen: String,
}

/// Timeout settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Handshake deadline in seconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Relay connect timeout in seconds.
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

fn default_handshake_timeout() -> u64 {
    defaults::DEFAULT_HANDSHAKE_TIMEOUT_SECS
}
fn default_connect_timeout() -> u64 {
    defaults::DEFAULT_CONNECT_TIMEOUT_SECS
}

/// Load client configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ClientError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ClientError::Config(format!("failed to read config: {e}")))?;
    let config: ClientConfig =
        toml::from_str(&content).map_err(|e| ClientError::Config(format!("TOML parse error: {e}")))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ClientConfig) -> Result<(), ClientError> {
    if config.channels.is_empty() {
        return Err(ClientError::Config("no channels configured".into()));
    }
    for binding in &config.channels {
        if binding.channel.trim().is_empty() {
            return Err(ClientError::Config("empty channel id in binding".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_client_config() {
        let toml_str = r#"
[client]
remote = "relay.example.com:8080"

[[channels]]
channel = "CHAN_A"
listen = "127.0.0.1:8080"

[[channels]]
channel = "CHAN_B"
listen = "127.0.0.1:8025"

[timeouts]
connect_timeout_secs = 15
"#;
        let config: ClientConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.client.remote, "relay.example.com:8080");
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].channel, "CHAN_A");
        assert_eq!(config.timeouts.connect_timeout_secs, 15);
        assert_eq!(config.timeouts.handshake_timeout_secs, 10); // default
    }
}
