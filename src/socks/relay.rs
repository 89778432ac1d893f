//! Bidirectional relay with half-close propagation
//!
//! Both directions run concurrently on the same task and are joined; a
//! failing direction never cancels the other. When a direction ends it
//! shuts down the write side of its destination and the read side of its
//! source, leaving the opposite direction free to drain.

use crate::pool::BufferPool;
use crate::stats::{Direction, Observer};
use socket2::SockRef;
use std::io;
use std::net::Shutdown;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

/// Outcome of one relay direction
#[derive(Debug)]
pub struct DirectionReport {
    /// Bytes written to the destination side
    pub bytes: u64,
    /// Time until the direction finished
    pub elapsed: Duration,
    /// First error hit by the copy, if any
    pub error: Option<io::Error>,
}

/// Outcome of a whole relay
#[derive(Debug)]
pub struct RelayReport {
    /// Client to destination
    pub tx: DirectionReport,
    /// Destination to client
    pub rx: DirectionReport,
    /// Time until both directions finished
    pub elapsed: Duration,
}

impl RelayReport {
    /// The relay error; `None` when both directions ended cleanly
    pub fn error(&self) -> Option<&io::Error> {
        self.tx.error.as_ref().or(self.rx.error.as_ref())
    }

    /// True when both directions ended cleanly
    pub fn is_success(&self) -> bool {
        self.error().is_none()
    }
}

/// Relay bytes between `client` and `dest` until both directions finish
pub async fn relay(
    client: TcpStream,
    dest: TcpStream,
    buffers: &BufferPool,
    observer: &dyn Observer,
) -> RelayReport {
    let start = Instant::now();
    observer.relay_started();

    let (mut client_read, mut client_write) = client.into_split();
    let (mut dest_read, mut dest_write) = dest.into_split();

    let (tx, rx) = tokio::join!(
        copy_direction(Direction::Tx, &mut client_read, &mut dest_write, buffers, observer),
        copy_direction(Direction::Rx, &mut dest_read, &mut client_write, buffers, observer),
    );

    let report = RelayReport {
        tx,
        rx,
        elapsed: start.elapsed(),
    };
    observer.relay_completed(report.elapsed, report.is_success());
    report
}

async fn copy_direction(
    direction: Direction,
    src: &mut OwnedReadHalf,
    dst: &mut OwnedWriteHalf,
    buffers: &BufferPool,
    observer: &dyn Observer,
) -> DirectionReport {
    let start = Instant::now();

    let (bytes, error) = {
        let mut buf = buffers.get();
        copy_until_eof(src, dst, &mut buf).await
    };

    if let Err(e) = dst.shutdown().await {
        debug!(direction = direction.label(), "failed to close write side: {}", e);
    }
    let src_stream: &TcpStream = src.as_ref();
    if let Err(e) = SockRef::from(src_stream).shutdown(Shutdown::Read) {
        debug!(direction = direction.label(), "failed to close read side: {}", e);
    }

    let elapsed = start.elapsed();
    observer.direction_completed(direction, bytes, elapsed, error.is_some());

    DirectionReport {
        bytes,
        elapsed,
        error,
    }
}

/// Copy until EOF, keeping the byte count when an error cuts it short
async fn copy_until_eof(
    src: &mut OwnedReadHalf,
    dst: &mut OwnedWriteHalf,
    buf: &mut [u8],
) -> (u64, Option<io::Error>) {
    let mut total = 0u64;
    loop {
        let n = match src.read(buf).await {
            Ok(0) => return (total, None),
            Ok(n) => n,
            Err(e) => return (total, Some(e)),
        };
        if let Err(e) = dst.write_all(&buf[..n]).await {
            return (total, Some(e));
        }
        total += n as u64;
    }
}
