//! Test utilities for Socksgate
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use socksgate::config::{parse_config, Config};
use socksgate::Server;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Create a connected TCP stream pair for testing
pub async fn create_tcp_stream_pair() -> (TcpStream, TcpStream) {
    let (listener, addr) = create_test_listener().await;

    let connect_fut = TcpStream::connect(addr);
    let accept_fut = listener.accept();

    let (client_stream, accepted) = tokio::join!(connect_fut, accept_fut);

    (client_stream.unwrap(), accepted.unwrap().0)
}

/// Start a server that echoes everything back, then closes after EOF
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut conn, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = conn.split();
                let mut buf = [0u8; 4096];
                loop {
                    match reader.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if writer.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = writer.shutdown().await;
            });
        }
    });
    addr
}

/// A running proxy and the handle that stops it
pub struct TestProxy {
    /// Address clients connect to
    pub addr: SocketAddr,
    shutdown_tx: broadcast::Sender<bool>,
}

impl TestProxy {
    /// Serve `server` on an ephemeral loopback port
    pub async fn start(server: Server) -> Self {
        let (listener, addr) = create_test_listener().await;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(async move { server.serve(listener, shutdown_rx).await });
        TestProxy { addr, shutdown_tx }
    }

    /// Connect a client to the proxy
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Test configuration builder
#[derive(Default)]
pub struct TestConfigBuilder {
    credentials: Option<(String, String)>,
    allow_from: Vec<String>,
    allow_sites: Vec<String>,
    deny_sites: Vec<String>,
    deny_ports: Vec<u16>,
    outgoing_addresses: Vec<String>,
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a username and password
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    /// Add a client allow-list entry
    pub fn allow_from(mut self, net: &str) -> Self {
        self.allow_from.push(net.to_string());
        self
    }

    /// Add an allowed site
    pub fn allow_site(mut self, site: &str) -> Self {
        self.allow_sites.push(site.to_string());
        self
    }

    /// Add a denied site
    pub fn deny_site(mut self, site: &str) -> Self {
        self.deny_sites.push(site.to_string());
        self
    }

    /// Add a denied port
    pub fn deny_port(mut self, port: u16) -> Self {
        self.deny_ports.push(port);
        self
    }

    /// Add an outgoing source address
    pub fn outgoing_address(mut self, ip: &str) -> Self {
        self.outgoing_addresses.push(ip.to_string());
        self
    }

    /// Build the configuration through the TOML parser
    pub fn build(self) -> Config {
        let list = |items: &[String]| {
            items
                .iter()
                .map(|s| format!("{:?}", s))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut toml = String::from("[incoming]\n");
        toml.push_str(&format!("allow_from = [{}]\n", list(&self.allow_from)));
        if let Some((username, password)) = &self.credentials {
            toml.push_str(&format!("username = {:?}\npassword = {:?}\n", username, password));
        }
        toml.push_str("[outgoing]\n");
        toml.push_str(&format!("allow_sites = [{}]\n", list(&self.allow_sites)));
        toml.push_str(&format!("deny_sites = [{}]\n", list(&self.deny_sites)));
        toml.push_str(&format!(
            "deny_ports = [{}]\n",
            self.deny_ports
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        toml.push_str(&format!("addresses = [{}]\n", list(&self.outgoing_addresses)));

        parse_config(&toml).unwrap()
    }
}

/// SOCKS4 request frames
pub mod socks4_mock {
    use socksgate::socks::*;

    /// CONNECT to an IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16, user: &str) -> Vec<u8> {
        let mut req = vec![SOCKS4_VERSION, SOCKS_CMD_CONNECT];
        req.extend_from_slice(&port.to_be_bytes());
        req.extend_from_slice(&ip);
        req.extend_from_slice(user.as_bytes());
        req.push(0);
        req
    }

    /// SOCKS4a CONNECT to a hostname
    pub fn create_connect_hostname(host: &str, port: u16, user: &str) -> Vec<u8> {
        let mut req = create_connect_ipv4([0, 0, 0, 1], port, user);
        req.extend_from_slice(host.as_bytes());
        req.push(0);
        req
    }
}

/// SOCKS5 handshake frames
pub mod socks5_mock {
    use socksgate::socks::*;

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a password auth method selection request
    pub fn create_auth_request_password() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_PASSWORD]
    }

    /// Username/password sub-negotiation
    pub fn create_credentials(username: &str, password: &str) -> Vec<u8> {
        let mut req = vec![SOCKS5_AUTH_VERSION, username.len() as u8];
        req.extend_from_slice(username.as_bytes());
        req.push(password.len() as u8);
        req.extend_from_slice(password.as_bytes());
        req
    }

    /// Create a connect command to IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS_CMD_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a connect command to domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS_CMD_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_tcp_stream_pair() {
        let (mut a, mut b) = create_tcp_stream_pair().await;

        a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_config_builder() {
        let config = TestConfigBuilder::new()
            .credentials("alice", "secret")
            .allow_from("127.0.0.0/8")
            .deny_port(25)
            .build();

        assert_eq!(config.incoming.credentials(), Some(("alice", "secret")));
        assert_eq!(config.incoming.subnets().len(), 1);
        assert_eq!(config.outgoing.deny_ports, vec![25]);
    }

    #[test]
    fn test_socks4_mock_hostname() {
        let req = socks4_mock::create_connect_hostname("a.b", 80, "");
        assert_eq!(req, vec![4, 1, 0, 80, 0, 0, 0, 1, 0, b'a', b'.', b'b', 0]);
    }
}
