//! Configuration-backed rule set
//!
//! Checks run in a fixed order: destination site, then client address,
//! then destination port. The first failing check is the reported reason.

use crate::config::Config;
use crate::socks::{Request, RuleSet};
use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use tracing::warn;

/// Why a request was denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// The destination hostname is not allowed
    Site(String),
    /// The client address is outside the allow-list
    Client(IpAddr),
    /// The destination port is denied
    Port(u16),
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Site(site) => write!(f, "site {:?} is not allowed", site),
            Denial::Client(ip) => write!(f, "client {} is not allowed", ip),
            Denial::Port(port) => write!(f, "port {} is denied", port),
        }
    }
}

/// Rule set built from `[incoming] allow_from` and the `[outgoing]` lists
#[derive(Debug, Clone, Default)]
pub struct ConfigRuleSet {
    allow_sites: Vec<String>,
    deny_sites: Vec<String>,
    deny_ports: Vec<u16>,
    allow_from: Vec<IpNet>,
}

impl ConfigRuleSet {
    /// Build from a prepared configuration
    pub fn from_config(config: &Config) -> Self {
        ConfigRuleSet {
            allow_sites: config.outgoing.allow_sites.clone(),
            deny_sites: config.outgoing.deny_sites.clone(),
            deny_ports: config.outgoing.deny_ports.clone(),
            allow_from: config.incoming.subnets().to_vec(),
        }
    }

    /// Check a request, returning the first failing rule
    pub fn check(&self, request: &Request) -> Result<(), Denial> {
        let site = request.hostname.to_lowercase();
        if !self.allow_site(&site) {
            return Err(Denial::Site(site));
        }

        if let Some(ip) = request.client_ip() {
            if !self.allow_client(ip) {
                return Err(Denial::Client(ip));
            }
        }

        if self.deny_ports.contains(&request.port) {
            return Err(Denial::Port(request.port));
        }

        Ok(())
    }

    fn allow_site(&self, site: &str) -> bool {
        if !self.allow_sites.is_empty()
            && !self.allow_sites.iter().any(|pattern| site_match(site, pattern))
        {
            return false;
        }
        !self.deny_sites.iter().any(|pattern| site_match(site, pattern))
    }

    fn allow_client(&self, ip: IpAddr) -> bool {
        // IPv4 clients accepted on a dual-stack socket arrive IPv4-mapped
        let ip = ip.to_canonical();
        self.allow_from.is_empty() || self.allow_from.iter().any(|net| net.contains(&ip))
    }
}

/// A leading dot matches by suffix, anything else must be equal
fn site_match(site: &str, pattern: &str) -> bool {
    if pattern.starts_with('.') {
        site.ends_with(pattern)
    } else {
        site == pattern
    }
}

impl RuleSet for ConfigRuleSet {
    fn matches(&self, request: &Request) -> bool {
        match self.check(request) {
            Ok(()) => true,
            Err(denial) => {
                warn!(
                    client_addr = ?request.client_addr,
                    dest_host = %request.dest_host(),
                    dest_port = request.port,
                    reason = %denial,
                    "denied access"
                );
                false
            }
        }
    }
}
