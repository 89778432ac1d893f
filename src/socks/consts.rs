//! SOCKS protocol constants
//!
//! Defines all constants used in the SOCKS4/4a and SOCKS5 implementation.

use std::time::Duration;

/// SOCKS4 protocol version
pub const SOCKS4_VERSION: u8 = 0x04;

/// Version byte at the start of every SOCKS4 response
pub const SOCKS4_REPLY_VERSION: u8 = 0x00;

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

/// SOCKS5 authentication sub-negotiation version
pub const SOCKS5_AUTH_VERSION: u8 = 0x01;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// GSSAPI authentication (not implemented)
pub const SOCKS5_AUTH_METHOD_GSSAPI: u8 = 0x01;
/// Username/password authentication
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Sub-negotiation status
/// Username/password accepted
pub const SOCKS5_AUTH_SUCCESS: u8 = 0x00;
/// Username/password rejected
pub const SOCKS5_AUTH_FAILURE: u8 = 0xFF;

// Commands
/// TCP CONNECT command
pub const SOCKS_CMD_CONNECT: u8 = 0x01;
/// TCP BIND command (not implemented)
pub const SOCKS_CMD_BIND: u8 = 0x02;
/// UDP ASSOCIATE command (not implemented)
pub const SOCKS_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

/// Size of each relay copy buffer
pub const COPY_BUFFER_SIZE: usize = 64 << 10;

/// Deadline for reading the negotiation from a client
pub const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Dial deadline applied when the request carries none
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
