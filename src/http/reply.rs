//! Reply construction and wire encoding.
//!
//! # Design Decisions
//! - A reply is fully built before any byte of it is written
//! - `Content-Length` is always derived from the body actually held,
//!   never trusted from a caller-set header
//! - Encoding hands out slices of the reply's own storage

use serde_json::Value;

use crate::http::request::Header;

const NAME_VALUE_SEPARATOR: &[u8] = b": ";
const CRLF: &[u8] = b"\r\n";

/// Server identification sent with every JSON reply.
pub const SERVER_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Reply statuses. The connection and handler send 200, 400 and 404;
/// 500 is there for [`RequestHandler`](crate::http::RequestHandler) implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    BadRequest,
    NotFound,
    InternalServerError,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    /// Full status line including the trailing CRLF.
    fn status_line(self) -> &'static [u8] {
        match self {
            StatusCode::Ok => b"HTTP/1.1 200 OK\r\n",
            StatusCode::BadRequest => b"HTTP/1.1 400 Bad Request\r\n",
            StatusCode::NotFound => b"HTTP/1.1 404 Not Found\r\n",
            StatusCode::InternalServerError => b"HTTP/1.1 500 Internal Server Error\r\n",
        }
    }
}

/// A reply to be sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<Header>,
    pub content: Vec<u8>,
}

impl Reply {
    /// An empty reply with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            content: Vec::new(),
        }
    }

    /// Canned HTML reply for a well-known status.
    pub fn stock(status: StatusCode) -> Self {
        let content = format!(
            "<html><head><title>{reason}</title></head><body><h1>{code} {reason}</h1></body></html>",
            code = status.as_u16(),
            reason = status.reason(),
        );
        let mut reply = Self::new(status);
        reply.set_content(content.into_bytes());
        reply.set_header("Content-Type", "text/html");
        reply
    }

    /// `200 OK` carrying a pretty-printed JSON document and a trailing newline.
    pub fn json(value: &Value) -> Self {
        let mut content = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"null".to_vec());
        content.push(b'\n');

        let mut reply = Self::new(StatusCode::Ok);
        reply.set_content(content);
        reply.set_header("Content-Type", "application/json");
        reply.set_header("Server", SERVER_NAME);
        reply
    }

    /// Replace the body and keep `Content-Length` in step with it.
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
        self.sync_content_length();
    }

    /// Set a header, replacing any existing one of the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|h| h.name.eq_ignore_ascii_case(name))
        {
            Some(header) => header.value = value,
            None => self.headers.push(Header::new(name, value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Mark the reply as the last one on its connection.
    pub fn close_connection(&mut self) {
        self.set_header("Connection", "close");
    }

    fn sync_content_length(&mut self) {
        let length = self.content.len().to_string();
        self.set_header("Content-Length", length);
    }

    /// Ordered wire buffers: status line, headers, blank line, body.
    /// Every slice borrows from the reply or from static storage.
    pub fn to_buffers(&mut self) -> Vec<&[u8]> {
        self.sync_content_length();

        let mut buffers = Vec::with_capacity(self.headers.len() * 4 + 3);
        buffers.push(self.status.status_line());
        for header in &self.headers {
            buffers.push(header.name.as_bytes());
            buffers.push(NAME_VALUE_SEPARATOR);
            buffers.push(header.value.as_bytes());
            buffers.push(CRLF);
        }
        buffers.push(CRLF);
        buffers.push(&self.content);
        buffers
    }

    /// Append the encoded reply to `out`.
    pub fn encode_into(&mut self, out: &mut Vec<u8>) {
        for buffer in self.to_buffers() {
            out.extend_from_slice(buffer);
        }
    }
}

/// Free-function form of [`Reply::stock`].
pub fn stock_reply(status: StatusCode) -> Reply {
    Reply::stock(status)
}
