//! SOCKS type definitions
//!
//! Defines the canonical request shared by the SOCKS4 and SOCKS5 handlers.

use super::consts::*;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tokio::time::Instant;

/// SOCKS protocol version of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// SOCKS4 and its 4a extension
    Socks4,
    /// SOCKS5
    Socks5,
}

impl Version {
    /// Parse a version byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS4_VERSION => Some(Version::Socks4),
            SOCKS5_VERSION => Some(Version::Socks5),
            _ => None,
        }
    }

    /// Label used in log fields and statistics
    pub fn label(self) -> &'static str {
        match self {
            Version::Socks4 => "SOCKS4/4a",
            Version::Socks5 => "SOCKS5",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// SOCKS command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for incoming connection (not implemented)
    Bind,
    /// UDP ASSOCIATE (not implemented)
    UdpAssociate,
    /// Any other command byte
    Unknown(u8),
}

impl Command {
    /// Parse a command byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            SOCKS_CMD_CONNECT => Command::Connect,
            SOCKS_CMD_BIND => Command::Bind,
            SOCKS_CMD_UDP_ASSOCIATE => Command::UdpAssociate,
            other => Command::Unknown(other),
        }
    }

    /// Convert to the wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            Command::Connect => SOCKS_CMD_CONNECT,
            Command::Bind => SOCKS_CMD_BIND,
            Command::UdpAssociate => SOCKS_CMD_UDP_ASSOCIATE,
            Command::Unknown(byte) => byte,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect => write!(f, "connect"),
            Command::Bind => write!(f, "bind"),
            Command::UdpAssociate => write!(f, "UDP associate"),
            Command::Unknown(byte) => write!(f, "unknown({:#04x})", byte),
        }
    }
}

/// A request from a SOCKS client.
///
/// Built field by field while the handshake is parsed and handed to the
/// [`Authenticator`](super::Authenticator), [`RuleSet`](super::RuleSet) and
/// [`Dialer`](super::Dialer) in that order.
///
/// When `hostname` is non-empty it is the destination and `ip` is ignored.
#[derive(Clone)]
pub struct Request {
    /// Protocol version
    pub version: Version,
    /// Requested command
    pub command: Command,
    /// Destination hostname; empty when the client sent an address
    pub hostname: String,
    /// Destination address; may be unset when `hostname` is used
    pub ip: Option<IpAddr>,
    /// Destination port
    pub port: u16,
    /// Username; may be empty
    pub username: String,
    /// Password; may be empty
    pub password: String,
    /// Remote address of the client connection
    pub client_addr: Option<SocketAddr>,
    /// Deadline inherited by the dialer
    pub deadline: Option<Instant>,
}

impl Request {
    /// Create an empty request for a client connection
    pub fn new(version: Version, client_addr: Option<SocketAddr>) -> Self {
        Request {
            version,
            command: Command::Connect,
            hostname: String::new(),
            ip: None,
            port: 0,
            username: String::new(),
            password: String::new(),
            client_addr,
            deadline: None,
        }
    }

    /// The client's IP address, if known
    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_addr.map(|addr| addr.ip())
    }

    /// Destination host as logged: the hostname, or else the IP
    pub fn dest_host(&self) -> String {
        if !self.hostname.is_empty() {
            self.hostname.clone()
        } else {
            self.ip.map(|ip| ip.to_string()).unwrap_or_default()
        }
    }

    /// Deadline for the dial step
    pub fn dial_deadline(&self) -> Instant {
        self.deadline
            .unwrap_or_else(|| Instant::now() + DEFAULT_DIAL_TIMEOUT)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("version", &self.version)
            .field("command", &self.command)
            .field("hostname", &self.hostname)
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_addr", &self.client_addr)
            .finish()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hostname.is_empty(), self.ip) {
            (true, Some(ip)) => write!(f, "{}", SocketAddr::new(ip, self.port)),
            _ => write!(f, "{}:{}", self.hostname, self.port),
        }
    }
}
