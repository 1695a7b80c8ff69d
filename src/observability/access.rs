//! Access log.
//!
//! One `info` event per answered request on the `access` target, carrying
//! the fields of a Common Log Format line.

use std::net::SocketAddr;
use std::time::Duration;

use crate::http::reply::Reply;
use crate::http::request::Request;

/// Record one request/reply exchange.
///
/// `request` may be partially filled when the reply is a 400 for
/// malformed input.
pub fn record(peer: SocketAddr, request: &Request, reply: &Reply, elapsed: Duration) {
    let method = if request.method.is_empty() { "-" } else { request.method.as_str() };
    let uri = if request.uri.is_empty() { "-" } else { request.uri.as_str() };

    tracing::info!(
        target: "access",
        peer = %peer.ip(),
        method,
        uri,
        version = %request.version_string(),
        status = reply.status.as_u16(),
        bytes = reply.content.len(),
        elapsed_us = elapsed.as_micros() as u64,
        "{} \"{} {} {}\" {} {}",
        peer.ip(),
        method,
        uri,
        request.version_string(),
        reply.status.as_u16(),
        reply.content.len(),
    );
}
