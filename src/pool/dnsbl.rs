//! DNS blacklist lookups
//!
//! An address is listed when `<reversed octets>.<domain>` resolves. Only
//! IPv4 addresses (including IPv4-mapped IPv6) can be checked; anything
//! else, or an empty domain, is never listed.

use async_trait::async_trait;
use std::fmt::Debug;
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tracing::trace;

/// Upper bound on a single blacklist lookup
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the DNSBL query name for `ip`, or an empty string when there is none
pub fn dnsbl_query_name(domain: &str, ip: IpAddr) -> String {
    if domain.is_empty() {
        return String::new();
    }
    match ip.to_canonical() {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{}.{}.{}.{}.{}", d, c, b, a, domain)
        }
        IpAddr::V6(_) => String::new(),
    }
}

/// Decides whether an outgoing address is blacklisted
#[async_trait]
pub trait BlacklistProbe: Send + Sync + Debug {
    /// Return true if `ip` is listed
    async fn is_listed(&self, ip: IpAddr) -> bool;
}

/// Probe backed by a DNSBL zone such as `zen.spamhaus.org`
#[derive(Debug, Clone)]
pub struct DnsblProbe {
    domain: String,
}

impl DnsblProbe {
    /// Probe against the DNSBL zone `domain`
    pub fn new(domain: impl Into<String>) -> Self {
        DnsblProbe {
            domain: domain.into(),
        }
    }
}

#[async_trait]
impl BlacklistProbe for DnsblProbe {
    async fn is_listed(&self, ip: IpAddr) -> bool {
        let name = dnsbl_query_name(&self.domain, ip);
        if name.is_empty() {
            return false;
        }
        // any answer at all means listed; a timed out lookup does not
        let listed = matches!(
            tokio::time::timeout(LOOKUP_TIMEOUT, lookup_host((name.as_str(), 0))).await,
            Ok(Ok(_))
        );
        trace!(query = %name, listed, "DNSBL lookup");
        listed
    }
}
