//! Request model filled in by the parser.
//!
//! A `Request` is owned by exactly one connection and reused across
//! keep-alive iterations; `clear()` must leave nothing of the previous
//! message behind.

use std::time::SystemTime;

/// A single header line, in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A request received from a client.
#[derive(Debug, Clone)]
pub struct Request {
    /// Method token, e.g. `GET`.
    pub method: String,
    /// Raw request target, before percent-decoding.
    pub uri: String,
    pub version_major: u8,
    pub version_minor: u8,
    /// Headers in arrival order.
    pub headers: Vec<Header>,
    /// Body bytes (exactly `Content-Length` of them).
    pub content: Vec<u8>,
    /// When the parser finished the message.
    pub received_at: SystemTime,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: String::new(),
            uri: String::new(),
            version_major: 0,
            version_minor: 0,
            headers: Vec::new(),
            content: Vec::new(),
            received_at: SystemTime::UNIX_EPOCH,
        }
    }
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every field so the value can hold the next request.
    /// Allocations are kept.
    pub fn clear(&mut self) {
        self.method.clear();
        self.uri.clear();
        self.version_major = 0;
        self.version_minor = 0;
        self.headers.clear();
        self.content.clear();
        self.received_at = SystemTime::UNIX_EPOCH;
    }

    /// Value of the first header whose name matches case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// True when the request's version is at least `major.minor`.
    pub fn version_at_least(&self, major: u8, minor: u8) -> bool {
        (self.version_major, self.version_minor) >= (major, minor)
    }

    /// Keep-alive decision for this request.
    ///
    /// HTTP/1.1 and later stay open unless the `Connection` header lists
    /// `close`. HTTP/1.0 always closes, even with `Connection: keep-alive`.
    pub fn wants_keep_alive(&self) -> bool {
        if !self.version_at_least(1, 1) {
            return false;
        }
        match self.header("connection") {
            Some(value) => !value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("close")),
            None => true,
        }
    }

    /// `HTTP/<major>.<minor>` as it appeared on the request line.
    pub fn version_string(&self) -> String {
        format!("HTTP/{}.{}", self.version_major, self.version_minor)
    }
}
