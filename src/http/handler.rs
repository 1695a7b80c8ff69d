//! Request handling: turn a parsed request into a reply.
//!
//! # Responsibilities
//! - Decode and sanity-check the request path
//! - Route `GET /` to service discovery
//! - Route `GET <service-path>` to method reflection
//! - Route `POST <service-path>` to JSON-RPC execution
//!
//! # Design Decisions
//! - Handlers are synchronous and fast; they run inline on the connection task
//! - The query string never takes part in routing

use std::sync::Arc;

use crate::http::reply::{Reply, StatusCode};
use crate::http::request::Request;
use crate::rpc::{dispatch, Registry};

/// Fills a reply for one request.
pub trait RequestHandler: Send + Sync {
    fn handle_request(&self, request: &Request, keepalive: bool) -> Reply;
}

/// Routes requests to the JSON-RPC services of a [`Registry`].
#[derive(Debug, Clone)]
pub struct RpcRequestHandler {
    registry: Arc<Registry>,
}

impl RpcRequestHandler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn route(&self, request: &Request) -> Reply {
        let is_get = match request.method.as_str() {
            "GET" => true,
            "POST" => false,
            _ => return Reply::stock(StatusCode::BadRequest),
        };

        let raw_path = request.uri.split('?').next().unwrap_or_default();
        let Some(path) = url_decode(raw_path) else {
            return Reply::stock(StatusCode::BadRequest);
        };

        // Path must be absolute and must not climb out.
        if !path.starts_with('/') || path.contains("..") {
            return Reply::stock(StatusCode::BadRequest);
        }

        if path == "/" {
            return if is_get {
                Reply::json(&self.registry.discovery())
            } else {
                Reply::stock(StatusCode::NotFound)
            };
        }

        let Some(service) = self.registry.get(&path) else {
            return Reply::stock(StatusCode::NotFound);
        };

        if is_get {
            Reply::json(&service.list_methods())
        } else {
            Reply::json(&dispatch::execute(service, &request.content))
        }
    }
}

impl RequestHandler for RpcRequestHandler {
    fn handle_request(&self, request: &Request, keepalive: bool) -> Reply {
        let mut reply = self.route(request);
        if !keepalive {
            reply.close_connection();
        }
        reply
    }
}

/// Percent-decode a request path. `+` becomes a space.
///
/// Returns `None` on a truncated or non-hex escape, or when the decoded
/// bytes are not UTF-8.
pub fn url_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3)?;
                let hex = std::str::from_utf8(hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}
