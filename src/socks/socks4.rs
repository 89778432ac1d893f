//! SOCKS4 and SOCKS4a handler
//!
//! ```text
//! request (after VER CMD):  DSTPORT(2) | DSTIP(4) | USERID NUL [| HOSTNAME NUL]
//! response:                 0x00 | STATUS | DSTPORT(2) | DSTIP(4)
//! ```
//!
//! A destination IP of `0.0.0.x` with `x != 0` selects SOCKS4a, where the
//! hostname follows the user id.

use super::consts::*;
use super::server::Server;
use super::types::{Command, Request, Version};
use crate::error::{Socks4Status, SocksgateError};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{error, info};

impl Server {
    /// Negotiate a SOCKS4/4a connection whose 2-byte preamble has been read.
    ///
    /// On failure the rejected response has already been written.
    pub(crate) async fn handle_socks4<S>(
        &self,
        stream: &mut S,
        client_addr: Option<SocketAddr>,
        cmd_byte: u8,
        deadline: Instant,
    ) -> Result<TcpStream, SocksgateError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut response = [0u8; 8];
        response[0] = SOCKS4_REPLY_VERSION;
        response[1] = Socks4Status::Rejected.into();

        let command = Command::from_byte(cmd_byte);
        let client = display_addr(client_addr);

        let negotiated = self
            .negotiate_socks4(stream, client_addr, command, deadline, &mut response)
            .await;
        match negotiated {
            Ok((request, dest)) => {
                response[1] = Socks4Status::Granted.into();
                if let Err(e) = write_response(stream, &response).await {
                    error!(
                        protocol = Version::Socks4.label(),
                        client_addr = %client,
                        error = %e,
                        "failed to write response"
                    );
                    return Err(e.into());
                }
                self.observer
                    .response_sent(Version::Socks4, Socks4Status::Granted.label());

                info!(
                    protocol = Version::Socks4.label(),
                    client_addr = %client,
                    command = %command,
                    dest_host = %request.dest_host(),
                    dest_addr = %display_addr(dest.peer_addr().ok()),
                    src_addr = %display_addr(dest.local_addr().ok()),
                    "proxy starts"
                );
                Ok(dest)
            }
            Err(e) => {
                let _ = write_response(stream, &response).await;
                self.observer
                    .response_sent(Version::Socks4, Socks4Status::Rejected.label());
                error!(
                    protocol = Version::Socks4.label(),
                    client_addr = %client,
                    command = %command,
                    error = %e,
                    "request rejected"
                );
                Err(e)
            }
        }
    }

    async fn negotiate_socks4<S>(
        &self,
        stream: &mut S,
        client_addr: Option<SocketAddr>,
        command: Command,
        deadline: Instant,
        response: &mut [u8; 8],
    ) -> Result<(Request, TcpStream), SocksgateError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if command != Command::Connect {
            return Err(SocksgateError::CommandNotSupported(command.to_byte()));
        }

        let request = self
            .read_phase(
                deadline,
                client_addr,
                read_request(stream, client_addr, command, response),
            )
            .await?;

        self.check_request(&request)?;

        let dest = self.dial_request(&request).await?;
        Ok((request, dest))
    }
}

/// Read the rest of a CONNECT request, copying port and address into `response`
async fn read_request<S>(
    stream: &mut S,
    client_addr: Option<SocketAddr>,
    command: Command,
    response: &mut [u8; 8],
) -> Result<Request, SocksgateError>
where
    S: AsyncRead + Unpin,
{
    let mut payload = [0u8; 6];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| SocksgateError::Protocol(format!("failed to read port/ip: {}", e)))?;
    response[2..8].copy_from_slice(&payload);

    let port = u16::from_be_bytes([payload[0], payload[1]]);
    let ip = Ipv4Addr::new(payload[2], payload[3], payload[4], payload[5]);

    let mut request = Request::new(Version::Socks4, client_addr);
    request.command = command;
    request.port = port;
    request.username = read_until_nul(stream)
        .await
        .map_err(|e| SocksgateError::Protocol(format!("failed to read username: {}", e)))?;

    if is_socks4a(ip) {
        request.hostname = read_until_nul(stream)
            .await
            .map_err(|e| SocksgateError::Protocol(format!("failed to read hostname: {}", e)))?;
    } else {
        request.ip = Some(IpAddr::V4(ip));
    }
    Ok(request)
}

/// `0.0.0.x` with non-zero `x` marks a SOCKS4a request
fn is_socks4a(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 0 && octets[1] == 0 && octets[2] == 0 && octets[3] != 0
}

/// Read a NUL-terminated UTF-8 string one byte at a time
async fn read_until_nul<S>(stream: &mut S) -> io::Result<String>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        let byte = stream.read_u8().await?;
        if byte == 0 {
            return String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
        }
        buf.push(byte);
    }
}

async fn write_response<S>(stream: &mut S, response: &[u8; 8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(response).await?;
    stream.flush().await
}

pub(crate) fn display_addr(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string())
}
