//! Outgoing address group
//!
//! Holds the candidate source addresses and splits them into valid and
//! invalid sets with a background blacklist prober. The lock only guards
//! the swap of the two lists; probing happens outside it.

use super::dnsbl::BlacklistProbe;
use crate::error::SocksgateError;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Pause between two probe cycles
pub const PROBE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Default)]
struct Classification {
    valid: Vec<IpAddr>,
    invalid: Vec<IpAddr>,
}

/// Candidate outgoing addresses and their blacklist classification
#[derive(Debug)]
pub struct AddressGroup {
    addresses: Vec<IpAddr>,
    state: Mutex<Classification>,
}

impl AddressGroup {
    /// Create a group with every address initially valid
    pub fn new(addresses: Vec<IpAddr>) -> Result<Self, SocksgateError> {
        if addresses.is_empty() {
            return Err(SocksgateError::Config(
                "address group needs at least one address".to_string(),
            ));
        }
        Ok(AddressGroup {
            state: Mutex::new(Classification {
                valid: addresses.clone(),
                invalid: Vec::new(),
            }),
            addresses,
        })
    }

    /// All configured addresses
    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    /// Pick a source address for `hint`.
    ///
    /// The same hint maps to the same address until the valid list changes.
    pub fn pick(&self, hint: u32) -> Option<IpAddr> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.valid.is_empty() {
            return None;
        }
        Some(state.valid[hint as usize % state.valid.len()])
    }

    /// Addresses currently considered usable
    pub fn valid(&self) -> Vec<IpAddr> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .valid
            .clone()
    }

    /// Addresses found blacklisted by the last probe cycle
    pub fn invalid(&self) -> Vec<IpAddr> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .invalid
            .clone()
    }

    /// Run one probe cycle and publish the result.
    ///
    /// When the valid addresses do not outnumber the invalid ones the cycle
    /// is distrusted and every address is published as valid.
    pub async fn probe_once(&self, probe: &dyn BlacklistProbe) {
        let mut valid = Vec::with_capacity(self.addresses.len());
        let mut invalid = Vec::new();
        for &ip in &self.addresses {
            if probe.is_listed(ip).await {
                invalid.push(ip);
            } else {
                valid.push(ip);
            }
        }

        if valid.len() <= invalid.len() {
            debug!(
                valid = valid.len(),
                invalid = invalid.len(),
                "too few valid addresses, using all of them"
            );
            valid = self.addresses.clone();
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.invalid != invalid && !invalid.is_empty() {
            let bad_ips: Vec<String> = invalid.iter().map(|ip| ip.to_string()).collect();
            warn!(bad_ips = ?bad_ips, "detect black-listed IP");
        }
        state.valid = valid;
        state.invalid = invalid;
    }

    /// Probe forever in a background task
    pub fn spawn_prober(self: &Arc<Self>, probe: Arc<dyn BlacklistProbe>) -> JoinHandle<()> {
        let group = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                group.probe_once(probe.as_ref()).await;
                tokio::time::sleep(PROBE_INTERVAL).await;
            }
        })
    }
}
