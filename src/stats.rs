//! Proxy observation points
//!
//! The server reports protocol and relay events to an [`Observer`] handed to
//! it at construction. [`ProxyStats`] keeps atomic counters that can be read
//! with [`ProxyStats::snapshot`]; [`NoopObserver`] discards everything.

use crate::socks::Version;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Direction of a relayed byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to destination
    Tx,
    /// Destination to client
    Rx,
}

impl Direction {
    /// Short label used in log fields
    pub fn label(self) -> &'static str {
        match self {
            Direction::Tx => "tx",
            Direction::Rx => "rx",
        }
    }
}

/// Sink for proxy events. Every method defaults to doing nothing.
pub trait Observer: Send + Sync + Debug {
    /// A connection was closed before a request could be parsed
    fn connection_rejected(&self, _reason: &'static str) {}

    /// A known protocol version was read from the preamble
    fn request_accepted(&self, _version: Version) {}

    /// The authenticator accepted or rejected a request
    fn auth_outcome(&self, _version: Version, _ok: bool) {}

    /// The rule set matched or denied a request
    fn rule_outcome(&self, _version: Version, _ok: bool) {}

    /// The dialer opened a destination connection or failed
    fn dial_outcome(&self, _version: Version, _ok: bool) {}

    /// A response frame was written with the given status
    fn response_sent(&self, _version: Version, _status: &'static str) {}

    /// A relay began
    fn relay_started(&self) {}

    /// One direction of a relay finished
    fn direction_completed(
        &self,
        _direction: Direction,
        _bytes: u64,
        _elapsed: Duration,
        _failed: bool,
    ) {
    }

    /// Both directions of a relay finished
    fn relay_completed(&self, _elapsed: Duration, _success: bool) {}
}

/// Observer that records nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Point-in-time copy of [`ProxyStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct StatsSnapshot {
    pub accepted_socks4: u64,
    pub accepted_socks5: u64,
    pub rejected_unknown_version: u64,
    pub rejected_invalid_request: u64,
    pub rejected_no_acceptable_method: u64,
    pub rejected_timeout: u64,
    pub auth_failures: u64,
    pub rule_denials: u64,
    pub dial_failures: u64,
    /// Responses written, keyed by `"<protocol> <status>"`
    pub responses: BTreeMap<String, u64>,
    pub relays_in_flight: u64,
    pub relays_succeeded: u64,
    pub relays_failed: u64,
    pub bytes_tx: u64,
    pub bytes_rx: u64,
    pub errors_tx: u64,
    pub errors_rx: u64,
}

/// Atomic counters fed by the server
#[derive(Debug, Default)]
pub struct ProxyStats {
    accepted_socks4: AtomicU64,
    accepted_socks5: AtomicU64,
    rejected_unknown_version: AtomicU64,
    rejected_invalid_request: AtomicU64,
    rejected_no_acceptable_method: AtomicU64,
    rejected_timeout: AtomicU64,
    rejected_other: AtomicU64,
    auth_failures: AtomicU64,
    rule_denials: AtomicU64,
    dial_failures: AtomicU64,
    responses: Mutex<BTreeMap<String, u64>>,
    relays_in_flight: AtomicU64,
    relays_succeeded: AtomicU64,
    relays_failed: AtomicU64,
    bytes_tx: AtomicU64,
    bytes_rx: AtomicU64,
    errors_tx: AtomicU64,
    errors_rx: AtomicU64,
}

impl ProxyStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            accepted_socks4: load(&self.accepted_socks4),
            accepted_socks5: load(&self.accepted_socks5),
            rejected_unknown_version: load(&self.rejected_unknown_version),
            rejected_invalid_request: load(&self.rejected_invalid_request),
            rejected_no_acceptable_method: load(&self.rejected_no_acceptable_method),
            rejected_timeout: load(&self.rejected_timeout),
            auth_failures: load(&self.auth_failures),
            rule_denials: load(&self.rule_denials),
            dial_failures: load(&self.dial_failures),
            responses: self
                .responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            relays_in_flight: load(&self.relays_in_flight),
            relays_succeeded: load(&self.relays_succeeded),
            relays_failed: load(&self.relays_failed),
            bytes_tx: load(&self.bytes_tx),
            bytes_rx: load(&self.bytes_rx),
            errors_tx: load(&self.errors_tx),
            errors_rx: load(&self.errors_rx),
        }
    }
}

fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Observer for ProxyStats {
    fn connection_rejected(&self, reason: &'static str) {
        match reason {
            "unknown_version" => incr(&self.rejected_unknown_version),
            "invalid_request" => incr(&self.rejected_invalid_request),
            "no_acceptable_method" => incr(&self.rejected_no_acceptable_method),
            "timeout" => incr(&self.rejected_timeout),
            _ => incr(&self.rejected_other),
        }
    }

    fn request_accepted(&self, version: Version) {
        match version {
            Version::Socks4 => incr(&self.accepted_socks4),
            Version::Socks5 => incr(&self.accepted_socks5),
        }
    }

    fn auth_outcome(&self, _version: Version, ok: bool) {
        if !ok {
            incr(&self.auth_failures);
        }
    }

    fn rule_outcome(&self, _version: Version, ok: bool) {
        if !ok {
            incr(&self.rule_denials);
        }
    }

    fn dial_outcome(&self, _version: Version, ok: bool) {
        if !ok {
            incr(&self.dial_failures);
        }
    }

    fn response_sent(&self, version: Version, status: &'static str) {
        let key = format!("{} {}", version.label(), status);
        *self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(0) += 1;
    }

    fn relay_started(&self) {
        incr(&self.relays_in_flight);
    }

    fn direction_completed(&self, direction: Direction, bytes: u64, _elapsed: Duration, failed: bool) {
        let (total, errors) = match direction {
            Direction::Tx => (&self.bytes_tx, &self.errors_tx),
            Direction::Rx => (&self.bytes_rx, &self.errors_rx),
        };
        total.fetch_add(bytes, Ordering::Relaxed);
        if failed {
            incr(errors);
        }
    }

    fn relay_completed(&self, _elapsed: Duration, success: bool) {
        self.relays_in_flight.fetch_sub(1, Ordering::Relaxed);
        if success {
            incr(&self.relays_succeeded);
        } else {
            incr(&self.relays_failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_by_reason() {
        let stats = ProxyStats::new();
        stats.connection_rejected("unknown_version");
        stats.connection_rejected("timeout");
        stats.connection_rejected("timeout");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rejected_unknown_version, 1);
        assert_eq!(snapshot.rejected_timeout, 2);
        assert_eq!(snapshot.rejected_invalid_request, 0);
    }

    #[test]
    fn test_outcomes_count_failures() {
        let stats = ProxyStats::new();
        stats.request_accepted(Version::Socks5);
        stats.auth_outcome(Version::Socks5, true);
        stats.auth_outcome(Version::Socks5, false);
        stats.rule_outcome(Version::Socks4, false);
        stats.dial_outcome(Version::Socks4, true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.accepted_socks5, 1);
        assert_eq!(snapshot.auth_failures, 1);
        assert_eq!(snapshot.rule_denials, 1);
        assert_eq!(snapshot.dial_failures, 0);
    }

    #[test]
    fn test_responses_keyed_by_protocol_and_status() {
        let stats = ProxyStats::new();
        stats.response_sent(Version::Socks4, "granted");
        stats.response_sent(Version::Socks4, "granted");
        stats.response_sent(Version::Socks5, "not allowed");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.responses.get("SOCKS4/4a granted"), Some(&2));
        assert_eq!(snapshot.responses.get("SOCKS5 not allowed"), Some(&1));
    }

    #[test]
    fn test_relay_accounting() {
        let stats = ProxyStats::new();
        stats.relay_started();
        stats.relay_started();
        assert_eq!(stats.snapshot().relays_in_flight, 2);

        stats.direction_completed(Direction::Tx, 100, Duration::ZERO, false);
        stats.direction_completed(Direction::Rx, 50, Duration::ZERO, true);
        stats.relay_completed(Duration::ZERO, false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.relays_in_flight, 1);
        assert_eq!(snapshot.bytes_tx, 100);
        assert_eq!(snapshot.bytes_rx, 50);
        assert_eq!(snapshot.errors_rx, 1);
        assert_eq!(snapshot.relays_failed, 1);
    }
}
