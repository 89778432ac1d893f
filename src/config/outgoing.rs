//! Outgoing (destination-facing) configuration

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Settings for connecting to destinations
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct OutgoingConfig {
    /// Sites that may be accessed; empty allows all. A leading dot matches by suffix.
    #[serde(default)]
    pub allow_sites: Vec<String>,

    /// Sites that may not be accessed
    #[serde(default)]
    pub deny_sites: Vec<String>,

    /// Destination ports that may not be accessed
    #[serde(default)]
    pub deny_ports: Vec<u16>,

    /// Source addresses for outgoing connections; empty disables the pool
    #[serde(default)]
    pub addresses: Vec<IpAddr>,

    /// DNSBL zone used to exclude black-listed source addresses
    #[serde(default)]
    pub dnsbl_domain: String,
}

impl OutgoingConfig {
    pub(crate) fn prepare(&mut self) {
        lowercase_all(&mut self.allow_sites);
        lowercase_all(&mut self.deny_sites);
    }
}

fn lowercase_all(sites: &mut [String]) {
    for site in sites.iter_mut() {
        *site = site.to_lowercase();
    }
}
