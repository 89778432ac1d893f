//! # Socksgate - Forward SOCKS Proxy
//!
//! Socksgate is a SOCKS4, SOCKS4a and SOCKS5 proxy server. It negotiates the
//! protocol with each client, applies access rules, opens the destination
//! connection and relays bytes in both directions until both sides close.
//!
//! ## Features
//!
//! - **SOCKS4/4a/5 CONNECT**: one server handles all three protocol versions
//! - **Access Rules**: site allow/deny lists, client subnets and denied ports
//! - **Outgoing Address Pool**: per-flow sticky source addresses
//! - **DNSBL Probing**: black-listed source addresses are taken out of rotation
//! - **Half-Close Relay**: each direction drains independently
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksgate::config::load_config;
//! use socksgate::run_daemon;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("socksgate.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_daemon(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Client -> Server::serve -> SOCKS4/5 handler -> (Authenticator, RuleSet, Dialer) -> relay
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod access;
pub mod config;
pub mod daemon;
pub mod dialer;
pub mod error;
pub mod pool;
pub mod socks;
pub mod stats;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use daemon::run_daemon;
pub use error::{DialError, SocksgateError};
pub use socks::Server;

/// Version of the Socksgate library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
