//! Configuration module for Socksgate
//!
//! This module provides configuration types and parsing for the proxy.

mod incoming;
mod log;
mod outgoing;

pub use incoming::{parse_network, IncomingConfig};
pub use log::{LogConfig, LogFormat};
pub use outgoing::OutgoingConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Settings for accepting clients
    #[serde(default)]
    pub incoming: IncomingConfig,

    /// Settings for connecting to destinations
    #[serde(default)]
    pub outgoing: OutgoingConfig,
}

impl Config {
    /// Normalize and validate a freshly deserialized configuration.
    ///
    /// Parses `allow_from` into subnets and lowercases the site lists.
    pub fn prepare(&mut self) -> Result<()> {
        self.incoming.prepare()?;
        self.outgoing.prepare();
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config.prepare()?;
    Ok(config)
}
