//! Channel registry: channel id -> destination target.
//!
//! Populated once at configuration load, then read concurrently by every
//! handshake negotiator. Owned by the composition root and passed in
//! explicitly.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::RegistryError;

/// A resolved destination for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Target {
    /// Channel id, unique across the registry.
    pub channel: String,
    /// Destination host.
    pub host: String,
    /// Destination port.
    pub port: u16,
}

impl Target {
    /// Destination as `host:port`, as carried in the handshake response.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}:{}", self.channel, self.host, self.port)
    }
}

/// Concurrent-safe lookup table from channel id to target.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Target>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target. Fails if the channel id is already present.
    pub fn add(&self, target: Target) -> Result<(), RegistryError> {
        let mut channels = self.channels.write();
        if channels.contains_key(&target.channel) {
            return Err(RegistryError::DuplicateChannel(target.channel));
        }
        channels.insert(target.channel.clone(), target);
        Ok(())
    }

    /// Resolve a channel id to its target.
    pub fn lookup(&self, channel: &str) -> Option<Target> {
        self.channels.read().get(channel).cloned()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}
