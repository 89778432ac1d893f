//! SOCKS module for Socksgate
//!
//! This module implements the SOCKS4, SOCKS4a and SOCKS5 server side: the
//! per-connection negotiation, the capability seams it consults, and the
//! relay that runs once a destination connection is open.

mod consts;
mod relay;
mod server;
mod socks4;
mod socks5;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use consts::*;
pub use relay::{relay, DirectionReport, RelayReport};
pub use server::Server;
pub use socks5::build_response as build_socks5_response;
pub use types::{Command, Request, Version};

use crate::error::DialError;
use async_trait::async_trait;
use std::fmt::Debug;
use tokio::net::TcpStream;

/// Decides whether a request is authenticated.
///
/// Implementations look at `username` and `password`; both may be empty.
pub trait Authenticator: Send + Sync + Debug {
    /// Return true if the request is authenticated
    fn authenticate(&self, request: &Request) -> bool;
}

/// Access control over requests.
pub trait RuleSet: Send + Sync + Debug {
    /// Return true if the request may proceed
    fn matches(&self, request: &Request) -> bool;
}

/// Opens the connection to the destination of a request.
#[async_trait]
pub trait Dialer: Send + Sync + Debug {
    /// Connect to the request's destination
    async fn dial(&self, request: &Request) -> Result<TcpStream, DialError>;
}
