//! Incoming (client-facing) configuration
//!
//! Listener port and addresses, the client allow-list and optional
//! credentials for the password authenticator.

use anyhow::{bail, Context, Result};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Default listening port
fn default_port() -> u16 {
    1080
}

/// Settings for accepting clients
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct IncomingConfig {
    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Addresses to listen on; empty means all IPv4 interfaces
    #[serde(default)]
    pub addresses: Vec<IpAddr>,

    /// Networks or single IPs allowed to use the proxy; empty allows all
    #[serde(default)]
    pub allow_from: Vec<String>,

    /// Username required from clients
    #[serde(default)]
    pub username: Option<String>,

    /// Password required from clients
    #[serde(default)]
    pub password: Option<String>,

    #[serde(skip)]
    allow_subnets: Vec<IpNet>,
}

impl Default for IncomingConfig {
    fn default() -> Self {
        IncomingConfig {
            port: default_port(),
            addresses: Vec::new(),
            allow_from: Vec::new(),
            username: None,
            password: None,
            allow_subnets: Vec::new(),
        }
    }
}

impl IncomingConfig {
    /// Parse `allow_from` and validate credentials
    pub(crate) fn prepare(&mut self) -> Result<()> {
        self.allow_subnets = self
            .allow_from
            .iter()
            .map(|s| {
                parse_network(s).with_context(|| format!("Invalid network or IP address: {}", s))
            })
            .collect::<Result<Vec<_>>>()?;

        if self.username.is_some() != self.password.is_some() {
            bail!("incoming.username and incoming.password must be set together");
        }
        Ok(())
    }

    /// Parsed client allow-list
    pub fn subnets(&self) -> &[IpNet] {
        &self.allow_subnets
    }

    /// Configured credentials, if any
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

/// Parse `a.b.c.d/n`, `x::y/n` or a bare address, which becomes a host route
pub fn parse_network(s: &str) -> Result<IpNet> {
    let net = if s.contains('/') {
        s.parse::<IpNet>()?
    } else {
        IpNet::from(s.parse::<IpAddr>()?)
    };
    Ok(net.trunc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_port() {
        assert_eq!(IncomingConfig::default().port, 1080);
    }

    #[test]
    fn test_parse_network_cidr() {
        let net = parse_network("10.0.0.0/8").unwrap();
        assert!(net.contains(&ip("10.1.32.4")));
        assert!(!net.contains(&ip("12.34.56.78")));
    }

    #[test]
    fn test_parse_network_bare_address_is_host_route() {
        let host = parse_network("192.168.1.1").unwrap();
        assert_eq!(host.to_string(), "192.168.1.1/32");
        assert!(host.contains(&ip("192.168.1.1")));
        assert!(!host.contains(&ip("192.168.1.2")));

        assert_eq!(parse_network("::1").unwrap().to_string(), "::1/128");
    }

    #[test]
    fn test_parse_network_masks_host_bits() {
        assert_eq!(parse_network("10.1.2.3/16").unwrap().to_string(), "10.1.0.0/16");
    }

    #[test]
    fn test_parse_network_ipv6() {
        let net = parse_network("2001:db8::/32").unwrap();
        assert!(net.contains(&ip("2001:db8::1")));
        assert!(!net.contains(&ip("2001:db9::1")));
        assert!(!net.contains(&ip("10.0.0.1")));
    }

    #[test]
    fn test_parse_network_errors() {
        assert!(parse_network("10.0.0.0/33").is_err());
        assert!(parse_network("not-an-ip").is_err());
        assert!(parse_network("10.0.0.0/x").is_err());
    }

    #[test]
    fn test_prepare_rejects_bad_network() {
        let mut config = IncomingConfig {
            allow_from: vec!["10.0.0.0/8".to_string(), "bogus".to_string()],
            ..Default::default()
        };
        assert!(config.prepare().is_err());
    }

    #[test]
    fn test_prepare_requires_both_credentials() {
        let mut config = IncomingConfig {
            username: Some("user".to_string()),
            ..Default::default()
        };
        assert!(config.prepare().is_err());

        config.password = Some("pass".to_string());
        assert!(config.prepare().is_ok());
        assert_eq!(config.credentials(), Some(("user", "pass")));
    }
}
