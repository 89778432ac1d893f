//! In-memory streams and capability doubles for handler tests

use super::{Authenticator, Dialer, Request, RuleSet};
use crate::error::DialError;
use async_trait::async_trait;
use std::io::{self, Cursor};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

/// A negotiation deadline far enough away not to matter
pub fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(10)
}

/// Stream that reads from a fixed script and records everything written
#[derive(Debug)]
pub struct MockStream {
    input: Cursor<Vec<u8>>,
    pub output: Vec<u8>,
}

impl MockStream {
    pub fn new(input: &[u8]) -> Self {
        MockStream {
            input: Cursor::new(input.to_vec()),
            output: Vec::new(),
        }
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.input).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.output.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Dialer that always connects to one local listener and records requests
#[derive(Debug)]
pub struct LoopbackDialer {
    target: SocketAddr,
    pub requests: Mutex<Vec<Request>>,
}

impl LoopbackDialer {
    /// Bind a listener that accepts and holds connections; returns the dialer
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((conn, _)) = listener.accept().await {
                held.push(conn);
            }
        });
        LoopbackDialer {
            target,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn dialed(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dialer for LoopbackDialer {
    async fn dial(&self, request: &Request) -> Result<TcpStream, DialError> {
        self.requests.lock().unwrap().push(request.clone());
        TcpStream::connect(self.target)
            .await
            .map_err(DialError::Connect)
    }
}

/// Dialer that fails every request with the given error kind
#[derive(Debug)]
pub struct FailingDialer(pub io::ErrorKind);

#[async_trait]
impl Dialer for FailingDialer {
    async fn dial(&self, _request: &Request) -> Result<TcpStream, DialError> {
        Err(DialError::Connect(io::Error::from(self.0)))
    }
}

/// Dialer that gives up with a timeout after the given delay
#[derive(Debug)]
pub struct SlowDialer(pub Duration);

#[async_trait]
impl Dialer for SlowDialer {
    async fn dial(&self, _request: &Request) -> Result<TcpStream, DialError> {
        tokio::time::sleep(self.0).await;
        Err(DialError::Timeout)
    }
}

/// Authenticator accepting exactly one username/password pair
#[derive(Debug)]
pub struct FixedAuth(pub &'static str, pub &'static str);

impl Authenticator for FixedAuth {
    fn authenticate(&self, request: &Request) -> bool {
        request.username == self.0 && request.password == self.1
    }
}

/// Rule set with a fixed answer
#[derive(Debug)]
pub struct FixedRules(pub bool);

impl RuleSet for FixedRules {
    fn matches(&self, _request: &Request) -> bool {
        self.0
    }
}
