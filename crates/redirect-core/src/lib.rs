//! Core types shared across redirect crates.
//!
//! This crate provides:
//! - Default configuration values
//! - The fixed-length handshake frame codec
//! - The chunk queue used by the forwarding engine
//! - The channel registry (channel id -> destination)

pub mod defaults;
pub mod error;
pub mod frame;
pub mod logging;
pub mod queue;
pub mod registry;

pub use error::{FrameError, RegistryError};
pub use queue::{ByteQueue, Chunk};
pub use registry::{ChannelRegistry, Target};

/// Project name.
pub const PROJECT_NAME: &str = "redirect";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
