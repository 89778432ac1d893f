//! Destination dialers
//!
//! [`DirectDialer`] lets the system pick the source address. [`PoolDialer`]
//! binds each outbound socket to an address from an [`AddressGroup`],
//! chosen by a hash of the client and destination addresses so that a flow
//! keeps its source address between probe cycles.

use crate::config::OutgoingConfig;
use crate::error::{DialError, SocksgateError};
use crate::pool::{AddressGroup, DnsblProbe};
use crate::socks::{Dialer, Request};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn fnv1a(mut hash: u32, bytes: &[u8]) -> u32 {
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn ip_bytes(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// FNV-1a over the client address bytes, then the destination address bytes
pub fn calc_hint(client: Option<IpAddr>, dest: IpAddr) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    if let Some(client) = client {
        hash = fnv1a(hash, &ip_bytes(client.to_canonical()));
    }
    fnv1a(hash, &ip_bytes(dest.to_canonical()))
}

/// Dialer that connects without choosing a source address
#[derive(Debug, Default, Clone)]
pub struct DirectDialer;

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, request: &Request) -> Result<TcpStream, DialError> {
        let deadline = request.dial_deadline();
        let connect = if !request.hostname.is_empty() {
            timeout_at(
                deadline,
                TcpStream::connect((request.hostname.as_str(), request.port)),
            )
            .await
        } else {
            let ip = request.ip.ok_or(DialError::NoDestination)?;
            timeout_at(deadline, TcpStream::connect(SocketAddr::new(ip, request.port))).await
        };

        match connect {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(DialError::Connect(e)),
            Err(_) => Err(DialError::Timeout),
        }
    }
}

/// Dialer that binds outbound sockets to addresses from an [`AddressGroup`]
#[derive(Debug, Clone)]
pub struct PoolDialer {
    group: Arc<AddressGroup>,
}

impl PoolDialer {
    /// Create a dialer drawing source addresses from `group`
    pub fn new(group: Arc<AddressGroup>) -> Self {
        PoolDialer { group }
    }

    async fn destinations(&self, request: &Request, deadline: Instant) -> Result<Vec<IpAddr>, DialError> {
        if request.hostname.is_empty() {
            return request.ip.map(|ip| vec![ip]).ok_or(DialError::NoDestination);
        }

        let resolved = timeout_at(deadline, lookup_host((request.hostname.as_str(), request.port)))
            .await
            .map_err(|_| DialError::Timeout)?
            .map_err(|source| DialError::Resolve {
                host: request.hostname.clone(),
                source,
            })?;
        let ips: Vec<IpAddr> = resolved.map(|addr| addr.ip()).collect();
        if ips.is_empty() {
            return Err(DialError::NoDestination);
        }
        Ok(ips)
    }

    /// Try each destination in order, binding a source address per attempt.
    ///
    /// Returns the first connection that opens, or the last error seen.
    async fn connect_any(
        &self,
        client_ip: Option<IpAddr>,
        destinations: Vec<IpAddr>,
        port: u16,
        deadline: Instant,
    ) -> Result<TcpStream, DialError> {
        let mut last_error = DialError::NoDestination;

        for ip in destinations {
            if Instant::now() >= deadline {
                return Err(DialError::Timeout);
            }

            let hint = calc_hint(client_ip, ip);
            let local = self.group.pick(hint);
            let remote = SocketAddr::new(ip, port);

            match timeout_at(deadline, connect_from(local, remote)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => {
                    debug!(dest_addr = %remote, src_ip = ?local, "connect failed: {}", e);
                    last_error = DialError::Connect(e);
                }
                Err(_) => last_error = DialError::Timeout,
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl Dialer for PoolDialer {
    async fn dial(&self, request: &Request) -> Result<TcpStream, DialError> {
        let deadline = request.dial_deadline();
        let destinations = self.destinations(request, deadline).await?;
        self.connect_any(request.client_ip(), destinations, request.port, deadline)
            .await
    }
}

async fn connect_from(local: Option<IpAddr>, remote: SocketAddr) -> std::io::Result<TcpStream> {
    let socket = match remote {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    if let Some(local) = local {
        socket.bind(SocketAddr::new(local, 0))?;
    }
    socket.connect(remote).await
}

/// Build the dialer for the `[outgoing]` configuration.
///
/// Without outgoing addresses connections are made directly. Otherwise an
/// [`AddressGroup`] is created and, when a DNSBL domain is set, its prober
/// is started.
pub fn create_dialer(config: &OutgoingConfig) -> Result<Arc<dyn Dialer>, SocksgateError> {
    if config.addresses.is_empty() {
        return Ok(Arc::new(DirectDialer));
    }

    let group = Arc::new(AddressGroup::new(config.addresses.clone())?);
    if !config.dnsbl_domain.is_empty() {
        info!(
            domain = %config.dnsbl_domain,
            addresses = group.addresses().len(),
            "starting DNSBL prober"
        );
        group.spawn_prober(Arc::new(DnsblProbe::new(config.dnsbl_domain.clone())));
    }
    Ok(Arc::new(PoolDialer::new(group)))
}
