//! SOCKS5 reply builder
//!
//! The reply echoes the destination exactly as the client requested it: a
//! hostname request gets a domain-type reply, otherwise the IP is sent in its
//! v4 or v6 form. The bound address of the outbound socket is not reported.

use crate::error::Socks5ReplyCode;
use crate::socks::consts::*;
use crate::socks::types::Request;
use bytes::{BufMut, Bytes, BytesMut};
use std::net::IpAddr;

/// Build the reply frame for `request` with the given status
pub fn build_response(request: &Request, status: Socks5ReplyCode) -> Bytes {
    let mut reply = BytesMut::with_capacity(6 + 1 + request.hostname.len().max(16));
    reply.put_u8(SOCKS5_VERSION);
    reply.put_u8(status.into());
    reply.put_u8(SOCKS5_RESERVED);

    if !request.hostname.is_empty() {
        // names longer than 255 bytes cannot come off the wire
        let name = &request.hostname.as_bytes()[..request.hostname.len().min(255)];
        reply.put_u8(SOCKS5_ADDR_TYPE_DOMAIN);
        reply.put_u8(name.len() as u8);
        reply.put_slice(name);
    } else {
        match request.ip {
            Some(IpAddr::V6(ip)) => {
                reply.put_u8(SOCKS5_ADDR_TYPE_IPV6);
                reply.put_slice(&ip.octets());
            }
            Some(IpAddr::V4(ip)) => {
                reply.put_u8(SOCKS5_ADDR_TYPE_IPV4);
                reply.put_slice(&ip.octets());
            }
            None => {
                reply.put_u8(SOCKS5_ADDR_TYPE_IPV4);
                reply.put_slice(&[0, 0, 0, 0]);
            }
        }
    }

    reply.put_u16(request.port);
    reply.freeze()
}
