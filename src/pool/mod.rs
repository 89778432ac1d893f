//! Outgoing address pool and relay buffer pool
//!
//! [`AddressGroup`] assigns source addresses to outbound connections and
//! keeps blacklisted ones out of rotation. [`BufferPool`] recycles the
//! relay's copy buffers.

mod address_group;
mod buffer;
mod dnsbl;

pub use address_group::{AddressGroup, PROBE_INTERVAL};
pub use buffer::{BufferPool, PooledBuffer};
pub use dnsbl::{dnsbl_query_name, BlacklistProbe, DnsblProbe};
