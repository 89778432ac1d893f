//! Error types for Socksgate
//!
//! This module defines the error taxonomy shared by the protocol handlers,
//! the dialer and the relay engine, plus the SOCKS status codes errors map to.

use std::io;
use thiserror::Error;

/// Main error type for Socksgate operations
#[derive(Error, Debug)]
pub enum SocksgateError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed frame, unknown version or address type, truncated read
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A requested hostname is not valid UTF-8
    #[error("Protocol error: hostname is not valid UTF-8")]
    InvalidHostname,

    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Request rejected by the rule set
    #[error("Denied by ruleset: {0}")]
    RuleDenied(String),

    /// Only CONNECT is acted upon
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Dial error
    #[error("Dial error: {0}")]
    Dial(#[from] DialError),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Errors raised while opening the outbound connection
#[derive(Error, Debug)]
pub enum DialError {
    /// Hostname resolution failed
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        /// The hostname that failed to resolve
        host: String,
        /// Underlying resolver error
        #[source]
        source: io::Error,
    },

    /// The request carries neither a hostname nor an IP address
    #[error("request has no destination address")]
    NoDestination,

    /// The dial deadline elapsed
    #[error("dial timeout")]
    Timeout,

    /// A connect attempt failed
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl Socks5ReplyCode {
    /// Short label used in logs and statistics
    pub fn label(self) -> &'static str {
        match self {
            Socks5ReplyCode::Succeeded => "granted",
            Socks5ReplyCode::GeneralFailure => "failure",
            Socks5ReplyCode::ConnectionNotAllowed => "not allowed",
            Socks5ReplyCode::NetworkUnreachable => "network unreachable",
            Socks5ReplyCode::HostUnreachable => "host unreachable",
            Socks5ReplyCode::ConnectionRefused => "connection refused",
            Socks5ReplyCode::TtlExpired => "TTL expired",
            Socks5ReplyCode::CommandNotSupported => "command not supported",
            Socks5ReplyCode::AddressTypeNotSupported => "address type not supported",
        }
    }
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl From<&io::Error> for Socks5ReplyCode {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NetworkUnreachable => Socks5ReplyCode::NetworkUnreachable,
            io::ErrorKind::ConnectionRefused => Socks5ReplyCode::ConnectionRefused,
            io::ErrorKind::HostUnreachable => Socks5ReplyCode::HostUnreachable,
            _ => Socks5ReplyCode::GeneralFailure,
        }
    }
}

impl From<&DialError> for Socks5ReplyCode {
    fn from(err: &DialError) -> Self {
        match err {
            DialError::Connect(e) => Socks5ReplyCode::from(e),
            _ => Socks5ReplyCode::GeneralFailure,
        }
    }
}

/// Status codes for SOCKS4 responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks4Status {
    /// Request granted
    Granted = 0x5a,
    /// Request rejected or failed
    Rejected = 0x5b,
    /// Client is not running identd
    NoIdentd = 0x5c,
    /// identd could not confirm the user id
    InvalidUser = 0x5d,
}

impl Socks4Status {
    /// Short label used in logs and statistics
    pub fn label(self) -> &'static str {
        match self {
            Socks4Status::Granted => "granted",
            Socks4Status::Rejected => "rejected",
            Socks4Status::NoIdentd => "no identd",
            Socks4Status::InvalidUser => "invalid user",
        }
    }
}

impl From<Socks4Status> for u8 {
    fn from(status: Socks4Status) -> Self {
        status as u8
    }
}
