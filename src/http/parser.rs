//! Incremental HTTP/1.x request parser.
//!
//! The parser is a byte-level state machine. It never looks back at
//! earlier input, so a request may arrive split at any byte boundary and
//! each piece is handed to [`RequestParser::feed`] as it is read. Fields are
//! written into the caller's [`Request`]. The URI and header values are
//! collected as raw bytes and must be UTF-8 once complete.
//!
//! ```text
//! MethodStart → Method → UriStart → Uri → "HTTP/" → Major . Minor → CRLF
//!     → (HeaderName : Value CRLF | folded continuation)* → CRLF
//!     → Body (Content-Length bytes) → Done
//! ```

use std::time::SystemTime;
use thiserror::Error;

use crate::config::LimitsConfig;
use crate::http::request::{Header, Request};

const VERSION_PREFIX: &[u8] = b"HTTP/";

/// Result of feeding one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The request is fully populated.
    Complete,
    /// More bytes are needed; partial state is kept.
    Incomplete,
    /// The input is not a valid request. Parsing stops for good.
    Invalid(ParseError),
}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid method token")]
    Method,
    #[error("invalid request target")]
    Uri,
    #[error("invalid HTTP version")]
    Version,
    #[error("expected CRLF line ending")]
    LineEnding,
    #[error("invalid header name")]
    HeaderName,
    #[error("invalid header value")]
    HeaderValue,
    #[error("request head exceeds {0} bytes")]
    HeadersTooLarge(usize),
    #[error("invalid Content-Length")]
    ContentLength,
    #[error("body exceeds {0} bytes")]
    BodyTooLarge(usize),
    #[error("transfer codings are not supported")]
    TransferEncoding,
}

/// Size limits enforced while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for ParserLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_header_bytes: config.max_header_bytes,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    MethodStart,
    Method,
    UriStart,
    Uri,
    VersionPrefix(usize),
    MajorStart,
    Major,
    MinorStart,
    Minor,
    RequestLineLf,
    HeaderLineStart,
    HeaderLws,
    HeaderName,
    SpaceBeforeValue,
    HeaderValue,
    HeaderLf,
    FinalLf,
    Body { remaining: usize },
    Done,
    Failed(ParseError),
}

/// Restartable request parser; one per connection.
#[derive(Debug, Clone)]
pub struct RequestParser {
    state: State,
    head_bytes: usize,
    limits: ParserLimits,
    /// Raw bytes of the URI or header value being read.
    token: Vec<u8>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new(ParserLimits::default())
    }
}

impl RequestParser {
    pub fn new(limits: ParserLimits) -> Self {
        Self {
            state: State::MethodStart,
            head_bytes: 0,
            limits,
            token: Vec::new(),
        }
    }

    /// Return to the initial state for the next request on a keep-alive
    /// connection. The caller clears its `Request` alongside.
    pub fn reset(&mut self) {
        self.state = State::MethodStart;
        self.head_bytes = 0;
        self.token.clear();
    }

    /// True when no byte of a request has been consumed yet.
    pub fn is_idle(&self) -> bool {
        self.state == State::MethodStart && self.head_bytes == 0
    }

    /// Consume the next chunk of the stream.
    ///
    /// Bytes after the end of a complete request are ignored.
    pub fn feed(&mut self, req: &mut Request, data: &[u8]) -> ParseStatus {
        let mut pos = 0;
        while pos < data.len() {
            match self.state {
                State::Done | State::Failed(_) => break,
                State::Body { remaining } => {
                    let take = remaining.min(data.len() - pos);
                    req.content.extend_from_slice(&data[pos..pos + take]);
                    pos += take;
                    self.state = if take == remaining {
                        finish(req)
                    } else {
                        State::Body {
                            remaining: remaining - take,
                        }
                    };
                }
                _ => {
                    self.head_bytes += 1;
                    if self.head_bytes > self.limits.max_header_bytes {
                        self.state = State::Failed(ParseError::HeadersTooLarge(
                            self.limits.max_header_bytes,
                        ));
                        break;
                    }
                    self.state = match self.consume(req, data[pos]) {
                        Ok(next) => next,
                        Err(e) => State::Failed(e),
                    };
                    pos += 1;
                }
            }
        }

        match self.state {
            State::Done => ParseStatus::Complete,
            State::Failed(e) => ParseStatus::Invalid(e),
            _ => ParseStatus::Incomplete,
        }
    }

    fn consume(&mut self, req: &mut Request, byte: u8) -> Result<State, ParseError> {
        let next = match self.state {
            // Empty lines before the request line are tolerated.
            State::MethodStart => match byte {
                b'\r' | b'\n' => State::MethodStart,
                b if is_token(b) => {
                    req.method.push(b as char);
                    State::Method
                }
                _ => return Err(ParseError::Method),
            },
            State::Method => match byte {
                b' ' => State::UriStart,
                b if is_token(b) => {
                    req.method.push(b as char);
                    State::Method
                }
                _ => return Err(ParseError::Method),
            },
            State::UriStart => match byte {
                b if b == b' ' || is_ctl(b) => return Err(ParseError::Uri),
                b => {
                    self.token.push(b);
                    State::Uri
                }
            },
            State::Uri => match byte {
                b' ' => {
                    req.uri = self.take_token().ok_or(ParseError::Uri)?;
                    State::VersionPrefix(0)
                }
                b if is_ctl(b) => return Err(ParseError::Uri),
                b => {
                    self.token.push(b);
                    State::Uri
                }
            },
            State::VersionPrefix(i) => {
                if byte != VERSION_PREFIX[i] {
                    return Err(ParseError::Version);
                }
                if i + 1 == VERSION_PREFIX.len() {
                    State::MajorStart
                } else {
                    State::VersionPrefix(i + 1)
                }
            }
            State::MajorStart => {
                req.version_major = digit(byte)?;
                State::Major
            }
            State::Major => match byte {
                b'.' => State::MinorStart,
                b => {
                    req.version_major = push_digit(req.version_major, b)?;
                    State::Major
                }
            },
            State::MinorStart => {
                req.version_minor = digit(byte)?;
                State::Minor
            }
            State::Minor => match byte {
                b'\r' => State::RequestLineLf,
                b => {
                    req.version_minor = push_digit(req.version_minor, b)?;
                    State::Minor
                }
            },
            State::RequestLineLf => expect_lf(byte, State::HeaderLineStart)?,
            // A header's value is stored once the next line shows it is
            // not folded.
            State::HeaderLineStart => match byte {
                b'\r' => {
                    self.store_value(req)?;
                    State::FinalLf
                }
                b' ' | b'\t' if !req.headers.is_empty() => State::HeaderLws,
                b if is_token(b) => {
                    self.store_value(req)?;
                    req.headers.push(Header::new((b as char).to_string(), String::new()));
                    State::HeaderName
                }
                _ => return Err(ParseError::HeaderName),
            },
            // Obsolete line folding: the continuation joins the previous
            // value with a single space.
            State::HeaderLws => match byte {
                b'\r' => State::HeaderLf,
                b' ' | b'\t' => State::HeaderLws,
                b if is_ctl(b) => return Err(ParseError::HeaderValue),
                b => {
                    if !self.token.is_empty() {
                        self.token.push(b' ');
                    }
                    self.token.push(b);
                    State::HeaderValue
                }
            },
            State::HeaderName => match byte {
                b':' => State::SpaceBeforeValue,
                b if is_token(b) => {
                    last_header(req)?.name.push(b as char);
                    State::HeaderName
                }
                _ => return Err(ParseError::HeaderName),
            },
            State::SpaceBeforeValue => match byte {
                b' ' | b'\t' => State::SpaceBeforeValue,
                b'\r' => State::HeaderLf,
                b if is_ctl(b) => return Err(ParseError::HeaderValue),
                b => {
                    self.token.push(b);
                    State::HeaderValue
                }
            },
            State::HeaderValue => match byte {
                b'\r' => State::HeaderLf,
                b if b != b'\t' && is_ctl(b) => return Err(ParseError::HeaderValue),
                b => {
                    self.token.push(b);
                    State::HeaderValue
                }
            },
            State::HeaderLf => {
                while matches!(self.token.last(), Some(b' ' | b'\t')) {
                    self.token.pop();
                }
                expect_lf(byte, State::HeaderLineStart)?
            }
            State::FinalLf => {
                expect_lf(byte, State::Done)?;
                self.begin_body(req)?
            }
            State::Body { .. } | State::Done | State::Failed(_) => self.state,
        };
        Ok(next)
    }

    /// Move the collected bytes out as UTF-8. `None` if they are not.
    fn take_token(&mut self) -> Option<String> {
        String::from_utf8(std::mem::take(&mut self.token)).ok()
    }

    /// Store the pending value, if any, on the last header.
    fn store_value(&mut self, req: &mut Request) -> Result<(), ParseError> {
        let Some(header) = req.headers.last_mut() else {
            return Ok(());
        };
        header.value = self.take_token().ok_or(ParseError::HeaderValue)?;
        Ok(())
    }

    fn begin_body(&self, req: &mut Request) -> Result<State, ParseError> {
        if req.header("transfer-encoding").is_some() {
            return Err(ParseError::TransferEncoding);
        }
        let length = match req.header("content-length") {
            Some(value) => parse_content_length(value)?,
            None => 0,
        };
        if length > self.limits.max_body_bytes {
            return Err(ParseError::BodyTooLarge(self.limits.max_body_bytes));
        }
        if length == 0 {
            return Ok(finish(req));
        }
        req.content.reserve(length.min(64 * 1024));
        Ok(State::Body { remaining: length })
    }
}

/// `1*DIGIT`; no sign, no inner whitespace.
fn parse_content_length(value: &str) -> Result<usize, ParseError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::ContentLength);
    }
    value.parse().map_err(|_| ParseError::ContentLength)
}

fn finish(req: &mut Request) -> State {
    req.received_at = SystemTime::now();
    State::Done
}

fn last_header(req: &mut Request) -> Result<&mut Header, ParseError> {
    req.headers.last_mut().ok_or(ParseError::HeaderName)
}

fn expect_lf(byte: u8, next: State) -> Result<State, ParseError> {
    if byte == b'\n' {
        Ok(next)
    } else {
        Err(ParseError::LineEnding)
    }
}

fn digit(byte: u8) -> Result<u8, ParseError> {
    if byte.is_ascii_digit() {
        Ok(byte - b'0')
    } else {
        Err(ParseError::Version)
    }
}

fn push_digit(acc: u8, byte: u8) -> Result<u8, ParseError> {
    acc.checked_mul(10)
        .and_then(|v| v.checked_add(digit(byte).ok()?))
        .ok_or(ParseError::Version)
}

fn is_ctl(byte: u8) -> bool {
    byte < 0x20 || byte == 0x7f
}

/// RFC 9110 `tchar`.
fn is_token(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}
