//! SOCKS5 handler
//!
//! Negotiation runs in two phases on the client stream: method selection
//! (with the optional username/password sub-negotiation), then the request
//! carrying command and destination. Commands other than CONNECT are
//! answered with "command not supported".

mod auth;
mod parser;
mod reply;

pub use reply::build_response;

use self::auth::{read_credentials, read_methods, select_method, send_auth_result, send_method, Method};
use self::parser::read_address;
use super::consts::*;
use super::server::Server;
use super::socks4::display_addr;
use super::types::{Command, Request, Version};
use crate::error::{Socks5ReplyCode, SocksgateError};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, error, info};

impl Server {
    /// Negotiate a SOCKS5 connection whose 2-byte preamble has been read.
    ///
    /// Once the destination is known every failure is answered with a reply
    /// frame; earlier failures may close without one.
    pub(crate) async fn handle_socks5<S>(
        &self,
        stream: &mut S,
        client_addr: Option<SocketAddr>,
        nmethods: u8,
        deadline: Instant,
    ) -> Result<TcpStream, SocksgateError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let client = display_addr(client_addr);
        let mut request = Request::new(Version::Socks5, client_addr);

        let negotiated = self
            .read_phase(
                deadline,
                client_addr,
                self.negotiate_auth(stream, &mut request, nmethods),
            )
            .await;
        if let Err(e) = negotiated {
            error!(
                protocol = Version::Socks5.label(),
                client_addr = %client,
                error = %e,
                "auth negotiation failed"
            );
            return Err(e);
        }

        let read = self
            .read_phase(deadline, client_addr, read_address(stream, &mut request))
            .await;
        if let Err(e) = read {
            error!(
                protocol = Version::Socks5.label(),
                client_addr = %client,
                error = %e,
                "failed to read request"
            );
            match &e {
                SocksgateError::Timeout(_) => {}
                SocksgateError::InvalidHostname => {
                    // the frame was complete, so it can still be answered
                    let status = Socks5ReplyCode::GeneralFailure;
                    let response = build_response(&request, status);
                    let _ = write_reply(stream, &response).await;
                    self.observer.response_sent(Version::Socks5, status.label());
                }
                _ => self.observer.connection_rejected("invalid_request"),
            }
            return Err(e);
        }

        debug!(request = ?request, "request info");

        let (status, result) = match self.connect_socks5(&request).await {
            Ok(dest) => (Socks5ReplyCode::Succeeded, Ok(dest)),
            Err(e) => (reply_code_for(&e), Err(e)),
        };

        let response = build_response(&request, status);
        let written = write_reply(stream, &response).await;
        self.observer.response_sent(Version::Socks5, status.label());

        match (result, written) {
            (Ok(dest), Ok(())) => {
                info!(
                    protocol = Version::Socks5.label(),
                    client_addr = %client,
                    command = %request.command,
                    dest_host = %request.dest_host(),
                    dest_addr = %display_addr(dest.peer_addr().ok()),
                    src_addr = %display_addr(dest.local_addr().ok()),
                    "proxy starts"
                );
                Ok(dest)
            }
            (Ok(_dest), Err(e)) => {
                error!(
                    protocol = Version::Socks5.label(),
                    client_addr = %client,
                    command = %request.command,
                    dest_host = %request.dest_host(),
                    error = %e,
                    "failed to write response"
                );
                Err(e.into())
            }
            (Err(e), _) => {
                error!(
                    protocol = Version::Socks5.label(),
                    client_addr = %client,
                    command = %request.command,
                    dest_host = %request.dest_host(),
                    status = status.label(),
                    error = %e,
                    "request rejected"
                );
                Err(e)
            }
        }
    }

    /// Phase A: method selection and optional sub-negotiation
    async fn negotiate_auth<S>(
        &self,
        stream: &mut S,
        request: &mut Request,
        nmethods: u8,
    ) -> Result<(), SocksgateError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let methods = read_methods(stream, nmethods).await.map_err(|e| {
            self.observer.connection_rejected("invalid_request");
            SocksgateError::Protocol(format!("failed to read auth methods: {}", e))
        })?;

        match select_method(&methods) {
            Some(Method::Password) => {
                send_method(stream, SOCKS5_AUTH_METHOD_PASSWORD).await?;

                let (username, password) = match read_credentials(stream).await {
                    Ok(credentials) => credentials,
                    Err(e) => {
                        let _ = send_auth_result(stream, SOCKS5_AUTH_FAILURE).await;
                        self.observer.connection_rejected("invalid_request");
                        return Err(e);
                    }
                };
                request.username = username;
                request.password = password;

                if let Err(e) = self.authenticate_request(request) {
                    let _ = send_auth_result(stream, SOCKS5_AUTH_FAILURE).await;
                    return Err(e);
                }
                send_auth_result(stream, SOCKS5_AUTH_SUCCESS).await?;
                Ok(())
            }
            Some(Method::NoAuth) => {
                // a configured authenticator still decides, with empty credentials
                if let Err(e) = self.authenticate_request(request) {
                    let _ = send_method(stream, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE).await;
                    return Err(e);
                }
                send_method(stream, SOCKS5_AUTH_METHOD_NONE).await?;
                Ok(())
            }
            None => {
                let _ = send_method(stream, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE).await;
                self.observer.connection_rejected("no_acceptable_method");
                Err(SocksgateError::Auth("no acceptable auth methods".to_string()))
            }
        }
    }

    /// Command check, rule set, then dial
    async fn connect_socks5(&self, request: &Request) -> Result<TcpStream, SocksgateError> {
        if request.command != Command::Connect {
            return Err(SocksgateError::CommandNotSupported(request.command.to_byte()));
        }
        self.check_rules(request)?;
        Ok(self.dial_request(request).await?)
    }
}

async fn write_reply<S>(stream: &mut S, response: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(response).await?;
    stream.flush().await
}

fn reply_code_for(err: &SocksgateError) -> Socks5ReplyCode {
    match err {
        SocksgateError::CommandNotSupported(_) => Socks5ReplyCode::CommandNotSupported,
        SocksgateError::RuleDenied(_) => Socks5ReplyCode::ConnectionNotAllowed,
        SocksgateError::Dial(e) => Socks5ReplyCode::from(e),
        _ => Socks5ReplyCode::GeneralFailure,
    }
}
