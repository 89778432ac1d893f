//! SOCKS5 request parser
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```

use crate::error::SocksgateError;
use crate::socks::consts::*;
use crate::socks::types::{Command, Request};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read the command, destination and port into `request`.
///
/// A domain name that is not valid UTF-8 is read to the end of the frame,
/// port included, and then reported as [`SocksgateError::InvalidHostname`].
pub(super) async fn read_address<S>(stream: &mut S, request: &mut Request) -> Result<(), SocksgateError>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| SocksgateError::Protocol(format!("failed to read address: {}", e)))?;

    if header[0] != SOCKS5_VERSION {
        return Err(SocksgateError::Protocol("request is not SOCKS5".to_string()));
    }
    request.command = Command::from_byte(header[1]);

    let mut valid_name = true;
    match header[3] {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut octets = [0u8; 4];
            read_field(stream, &mut octets, "address").await?;
            request.ip = Some(IpAddr::V4(Ipv4Addr::from(octets)));
        }
        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut octets = [0u8; 16];
            read_field(stream, &mut octets, "address").await?;
            request.ip = Some(IpAddr::V6(Ipv6Addr::from(octets)));
        }
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let mut len = [0u8; 1];
            read_field(stream, &mut len, "address").await?;
            let mut name = vec![0u8; len[0] as usize];
            read_field(stream, &mut name, "address").await?;
            match String::from_utf8(name) {
                Ok(hostname) => request.hostname = hostname,
                Err(_) => valid_name = false,
            }
        }
        other => {
            return Err(SocksgateError::Protocol(format!(
                "unknown address type: {}",
                other
            )));
        }
    }

    let mut port = [0u8; 2];
    read_field(stream, &mut port, "port number").await?;
    request.port = u16::from_be_bytes(port);

    if !valid_name {
        return Err(SocksgateError::InvalidHostname);
    }
    Ok(())
}

async fn read_field<S>(stream: &mut S, buf: &mut [u8], what: &str) -> Result<(), SocksgateError>
where
    S: AsyncRead + Unpin,
{
    stream
        .read_exact(buf)
        .await
        .map(|_| ())
        .map_err(|e| SocksgateError::Protocol(format!("failed to read {}: {}", what, e)))
}
