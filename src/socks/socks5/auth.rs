//! SOCKS5 method selection and RFC 1929 username/password sub-negotiation

use crate::error::SocksgateError;
use crate::socks::consts::*;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Authentication method chosen from the client's offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Method {
    /// Username/password sub-negotiation
    Password,
    /// No authentication
    NoAuth,
}

/// Pick a method from the offered set; username/password wins over no-auth
pub(super) fn select_method(methods: &[u8]) -> Option<Method> {
    if methods.contains(&SOCKS5_AUTH_METHOD_PASSWORD) {
        Some(Method::Password)
    } else if methods.contains(&SOCKS5_AUTH_METHOD_NONE) {
        Some(Method::NoAuth)
    } else {
        None
    }
}

/// Read the `nmethods` method bytes that follow the preamble
pub(super) async fn read_methods<S>(stream: &mut S, nmethods: u8) -> std::io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut methods = vec![0u8; nmethods as usize];
    stream.read_exact(&mut methods).await?;
    Ok(methods)
}

/// Read username and password from the client.
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 0 to 255 |  1   | 0 to 255 |
/// +----+------+----------+------+----------+
/// ```
///
/// Zero lengths yield empty strings.
pub(super) async fn read_credentials<S>(stream: &mut S) -> Result<(String, String), SocksgateError>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| SocksgateError::Protocol(format!("failed to read username/password: {}", e)))?;

    if header[0] != SOCKS5_AUTH_VERSION {
        return Err(SocksgateError::Protocol(format!(
            "invalid auth version: {}",
            header[0]
        )));
    }

    let username = read_string(stream, header[1] as usize)
        .await
        .map_err(|e| SocksgateError::Protocol(format!("failed to read username: {}", e)))?;

    let password_len = stream
        .read_u8()
        .await
        .map_err(|e| SocksgateError::Protocol(format!("failed to read password length: {}", e)))?;
    let password = read_string(stream, password_len as usize)
        .await
        .map_err(|e| SocksgateError::Protocol(format!("failed to read password: {}", e)))?;

    Ok((username, password))
}

async fn read_string<S>(stream: &mut S, len: usize) -> std::io::Result<String>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Send `[0x05, method]`
pub(super) async fn send_method<S>(stream: &mut S, method: u8) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&[SOCKS5_VERSION, method]).await?;
    stream.flush().await
}

/// Send `[0x01, status]`
pub(super) async fn send_auth_result<S>(stream: &mut S, status: u8) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&[SOCKS5_AUTH_VERSION, status]).await?;
    stream.flush().await
}
