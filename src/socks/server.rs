//! SOCKS server and connection dispatcher
//!
//! [`Server::serve`] accepts connections and runs one task per client. Each
//! task reads the version preamble, hands the connection to the SOCKS4 or
//! SOCKS5 handler, and relays bytes once a destination connection is open.

use super::consts::NEGOTIATION_TIMEOUT;
use super::relay::relay;
use super::socks4::display_addr;
use super::types::{Request, Version};
use super::{Authenticator, Dialer, RuleSet};
use crate::dialer::DirectDialer;
use crate::error::{DialError, SocksgateError};
use crate::pool::BufferPool;
use crate::stats::{NoopObserver, Observer};
use anyhow::Result;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Keepalive applied to destination connections
const DEST_KEEPALIVE: Duration = Duration::from_secs(180);

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// SOCKS4/4a/5 server.
///
/// Cloning is cheap; all clones share the capabilities and buffer pool.
#[derive(Debug, Clone)]
pub struct Server {
    auth: Option<Arc<dyn Authenticator>>,
    rules: Option<Arc<dyn RuleSet>>,
    dialer: Arc<dyn Dialer>,
    pub(crate) observer: Arc<dyn Observer>,
    buffers: Arc<BufferPool>,
    negotiation_timeout: Duration,
    silence_logs: bool,
}

impl Default for Server {
    fn default() -> Self {
        Server::new(Arc::new(DirectDialer::default()))
    }
}

impl Server {
    /// Create a server that opens destination connections with `dialer`
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Server {
            auth: None,
            rules: None,
            dialer,
            observer: Arc::new(NoopObserver),
            buffers: Arc::new(BufferPool::default()),
            negotiation_timeout: NEGOTIATION_TIMEOUT,
            silence_logs: false,
        }
    }

    /// Authenticate every request with `auth`
    pub fn with_authenticator(mut self, auth: Arc<dyn Authenticator>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Check every request against `rules`
    pub fn with_rules(mut self, rules: Arc<dyn RuleSet>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Report events to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Set the deadline for the negotiation phase
    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    /// Log successful proxy completions at debug level
    pub fn with_silence_logs(mut self, silence: bool) -> Self {
        self.silence_logs = silence;
        self
    }

    /// Accept connections from `listener` until shutdown is signalled.
    ///
    /// Each accepted connection runs in its own task; errors are contained
    /// to that connection.
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<bool>,
    ) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(listen_addr = %local_addr, "server starts");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((conn, client_addr)) => {
                            let server = self.clone();
                            tokio::spawn(async move {
                                server.handle_connection(conn, client_addr).await;
                            });
                        }
                        Err(e) => {
                            warn!("Failed to accept connection on {}: {}", local_addr, e);
                            tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!(listen_addr = %local_addr, "Shutdown signal received, closing listener");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Negotiate, then relay until both directions are done
    pub async fn handle_connection(&self, mut conn: TcpStream, client_addr: SocketAddr) {
        let dest = match self.negotiate(&mut conn, Some(client_addr)).await {
            Ok(dest) => dest,
            Err(e) => {
                debug!("Connection from {} closed: {}", client_addr, e);
                return;
            }
        };

        if let Err(e) = set_keepalive(&dest) {
            debug!("Failed to enable keepalive on destination connection: {}", e);
        }

        let report = relay(conn, dest, &self.buffers, self.observer.as_ref()).await;

        let elapsed = report.elapsed.as_secs_f64();
        match report.error() {
            Some(e) => error!(
                client_addr = %client_addr,
                elapsed,
                bytes_tx = report.tx.bytes,
                bytes_rx = report.rx.bytes,
                error = %e,
                "proxy ends with an error"
            ),
            None if self.silence_logs => debug!(
                client_addr = %client_addr,
                elapsed,
                bytes_tx = report.tx.bytes,
                bytes_rx = report.rx.bytes,
                "proxy ends"
            ),
            None => info!(
                client_addr = %client_addr,
                elapsed,
                bytes_tx = report.tx.bytes,
                bytes_rx = report.rx.bytes,
                "proxy ends"
            ),
        }
    }

    /// Run the negotiation phase on a client stream.
    ///
    /// Reads the 2-byte preamble and dispatches on the version byte. Reads
    /// from the client share one deadline, `negotiation_timeout` from now;
    /// the dial is bounded by the dialer's own deadline so that a failed
    /// dial is still answered. Returns the open destination connection.
    pub async fn negotiate<S>(
        &self,
        stream: &mut S,
        client_addr: Option<SocketAddr>,
    ) -> Result<TcpStream, SocksgateError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let deadline = Instant::now() + self.negotiation_timeout;

        let mut preamble = [0u8; 2];
        let read = self
            .read_phase(deadline, client_addr, async {
                stream.read_exact(&mut preamble).await.map_err(|e| {
                    SocksgateError::Protocol(format!("failed to read preamble: {}", e))
                })
            })
            .await;
        if let Err(e) = read {
            if matches!(e, SocksgateError::Protocol(_)) {
                error!(
                    client_addr = %display_addr(client_addr),
                    error = %e,
                    "failed to read preamble"
                );
                self.observer.connection_rejected("invalid_request");
            }
            return Err(e);
        }

        match Version::from_byte(preamble[0]) {
            Some(version) => {
                self.observer.request_accepted(version);
                match version {
                    Version::Socks4 => {
                        self.handle_socks4(stream, client_addr, preamble[1], deadline)
                            .await
                    }
                    Version::Socks5 => {
                        self.handle_socks5(stream, client_addr, preamble[1], deadline)
                            .await
                    }
                }
            }
            None => {
                // no response frame exists for an unknown version
                error!(
                    client_addr = %display_addr(client_addr),
                    version = preamble[0],
                    "unknown SOCKS version"
                );
                self.observer.connection_rejected("unknown_version");
                Err(SocksgateError::Protocol(format!(
                    "unknown SOCKS version: {}",
                    preamble[0]
                )))
            }
        }
    }

    /// Run a read phase of the negotiation under the connection's deadline
    pub(crate) async fn read_phase<T, F>(
        &self,
        deadline: Instant,
        client_addr: Option<SocketAddr>,
        phase: F,
    ) -> Result<T, SocksgateError>
    where
        F: Future<Output = Result<T, SocksgateError>>,
    {
        match timeout_at(deadline, phase).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    client_addr = %display_addr(client_addr),
                    "negotiation timed out"
                );
                self.observer.connection_rejected("timeout");
                Err(SocksgateError::Timeout("negotiation".to_string()))
            }
        }
    }

    /// Consult the authenticator, if any
    pub(crate) fn authenticate_request(&self, request: &Request) -> Result<(), SocksgateError> {
        if let Some(auth) = &self.auth {
            let ok = auth.authenticate(request);
            self.observer.auth_outcome(request.version, ok);
            if !ok {
                return Err(SocksgateError::Auth("authentication failure".to_string()));
            }
        }
        Ok(())
    }

    /// Consult the rule set, if any
    pub(crate) fn check_rules(&self, request: &Request) -> Result<(), SocksgateError> {
        if let Some(rules) = &self.rules {
            let ok = rules.matches(request);
            self.observer.rule_outcome(request.version, ok);
            if !ok {
                return Err(SocksgateError::RuleDenied("ruleset mismatch".to_string()));
            }
        }
        Ok(())
    }

    /// Authenticator, then rule set
    pub(crate) fn check_request(&self, request: &Request) -> Result<(), SocksgateError> {
        self.authenticate_request(request)?;
        self.check_rules(request)
    }

    pub(crate) async fn dial_request(&self, request: &Request) -> Result<TcpStream, DialError> {
        let result = self.dialer.dial(request).await;
        self.observer.dial_outcome(request.version, result.is_ok());
        result
    }

    /// Whether requests are authenticated
    pub fn has_authenticator(&self) -> bool {
        self.auth.is_some()
    }
}

fn set_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let socket = socket2::SockRef::from(stream);
    let keepalive = socket2::TcpKeepalive::new().with_time(DEST_KEEPALIVE);
    socket.set_tcp_keepalive(&keepalive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socks::testing::*;
    use crate::stats::ProxyStats;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_unknown_version_gets_no_response() {
        let stats = Arc::new(ProxyStats::new());
        let server = Server::default().with_observer(stats.clone());
        let mut stream = MockStream::new(&[0x06, 0x01]);

        let result = server.negotiate(&mut stream, None).await;
        assert!(matches!(result, Err(SocksgateError::Protocol(_))));
        assert!(stream.output.is_empty());
        assert_eq!(stats.snapshot().rejected_unknown_version, 1);
    }

    #[tokio::test]
    async fn test_short_preamble_is_protocol_error() {
        let server = Server::default();
        let mut stream = MockStream::new(&[0x05]);

        let result = server.negotiate(&mut stream, None).await;
        assert!(matches!(result, Err(SocksgateError::Protocol(_))));
        assert!(stream.output.is_empty());
    }

    #[tokio::test]
    async fn test_negotiation_timeout() {
        let server = Server::default().with_negotiation_timeout(Duration::from_millis(50));
        // the client never sends anything
        let (_client, mut conn) = tokio::io::duplex(64);

        let result = server.negotiate(&mut conn, None).await;
        assert!(matches!(result, Err(SocksgateError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_dial_past_read_deadline_still_replies() {
        let server = Server::new(Arc::new(SlowDialer(Duration::from_millis(400))))
            .with_negotiation_timeout(Duration::from_millis(300));
        let (mut client, mut conn) = tokio::io::duplex(256);

        let client_task = tokio::spawn(async move {
            client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            client
                .write_all(&[0x05, 0x01, 0x00, 0x01, 10, 0, 0, 1, 0x00, 0x50])
                .await
                .unwrap();
            let mut received = [0u8; 12];
            client.read_exact(&mut received).await.unwrap();
            received
        });

        let result = server.negotiate(&mut conn, None).await;
        assert!(matches!(
            result,
            Err(SocksgateError::Dial(DialError::Timeout))
        ));
        assert_eq!(
            client_task.await.unwrap(),
            [0x05, 0x00, 0x05, 0x01, 0x00, 0x01, 10, 0, 0, 1, 0x00, 0x50]
        );
    }

    #[tokio::test]
    async fn test_dispatch_to_socks4() {
        let dialer = Arc::new(LoopbackDialer::start().await);
        let server = Server::new(dialer.clone());
        let mut stream = MockStream::new(&[0x04, 0x01, 0x00, 0x50, 10, 0, 0, 1, 0x00]);

        assert!(server.negotiate(&mut stream, None).await.is_ok());
        assert_eq!(stream.output[1], 0x5a);
        assert_eq!(dialer.dialed()[0].version, Version::Socks4);
    }

    #[tokio::test]
    async fn test_dispatch_to_socks5() {
        let dialer = Arc::new(LoopbackDialer::start().await);
        let server = Server::new(dialer.clone());
        let mut stream = MockStream::new(&[
            0x05, 0x01, 0x00, // no auth
            0x05, 0x01, 0x00, 0x01, 10, 0, 0, 1, 0x00, 0x50,
        ]);

        assert!(server.negotiate(&mut stream, None).await.is_ok());
        assert_eq!(&stream.output[..2], &[0x05, 0x00]);
        assert_eq!(stream.output[3], 0x00);
        assert_eq!(dialer.dialed()[0].version, Version::Socks5);
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = Server::new(Arc::new(FailingDialer(std::io::ErrorKind::ConnectionRefused)));

        let handle = tokio::spawn(async move { server.serve(listener, shutdown_rx).await });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(&[0x04, 0x01, 0x00, 0x50, 1, 2, 3, 4, 0x00])
            .await
            .unwrap();
        let mut response = [0u8; 8];
        client.read_exact(&mut response).await.unwrap();
        assert_eq!(response[1], 0x5b);

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }
}
