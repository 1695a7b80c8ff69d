//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Keep a table of live connections keyed by ID
//! - Drive one connection through read → parse → dispatch → write,
//!   looping on keep-alive
//!
//! # Design Decisions
//! - One tokio task per connection. Only that task touches the request,
//!   parser and buffers, so no two steps of a connection ever overlap
//! - The table entry is owned by a guard; dropping it is the transition
//!   to `Closed`
//! - Transport errors end the connection silently; nothing is retried

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::ServerConfig;
use crate::http::handler::RequestHandler;
use crate::http::parser::{ParseError, ParseStatus, ParserLimits, RequestParser};
use crate::http::reply::{Reply, StatusCode};
use crate::http::request::Request;
use crate::lifecycle::ShutdownSignal;
use crate::observability::{access, metrics};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, nothing done yet.
    Accepted,
    /// TLS handshake in progress.
    Handshaking,
    /// Waiting for request bytes.
    Reading,
    /// A complete (or rejected) request is held.
    Parsed,
    /// The request handler is filling the reply.
    Dispatching,
    /// The reply is being written.
    Writing,
    /// Half-closing after the last reply.
    Closing,
    /// Gone from the table.
    Closed,
}

/// Table entry for one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub peer: SocketAddr,
    pub secure: bool,
    pub state: ConnectionState,
    pub opened_at: Instant,
    pub requests: u64,
}

/// Table of live connections.
///
/// Cheap to clone; all clones share the table.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    table: Arc<DashMap<ConnectionId, ConnectionEntry>>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. Returns a guard that removes it on drop.
    pub fn track(&self, peer: SocketAddr, secure: bool) -> ConnectionGuard {
        let id = ConnectionId::new();
        self.table.insert(
            id,
            ConnectionEntry {
                peer,
                secure,
                state: ConnectionState::Accepted,
                opened_at: Instant::now(),
                requests: 0,
            },
        );
        metrics::connection_opened();
        ConnectionGuard {
            table: Arc::clone(&self.table),
            id,
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> usize {
        self.table.len()
    }

    /// Current state; `Closed` once the connection has left the table.
    pub fn state_of(&self, id: ConnectionId) -> ConnectionState {
        self.table
            .get(&id)
            .map(|entry| entry.state)
            .unwrap_or(ConnectionState::Closed)
    }

    /// Copy of every live entry.
    pub fn snapshot(&self) -> Vec<(ConnectionId, ConnectionEntry)> {
        self.table
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Wait until all connections are closed.
    pub async fn wait_for_shutdown(&self) {
        while !self.table.is_empty() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
/// Removes the table entry when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    table: Arc<DashMap<ConnectionId, ConnectionEntry>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn set_state(&self, state: ConnectionState) {
        if let Some(mut entry) = self.table.get_mut(&self.id) {
            entry.state = state;
        }
    }

    fn count_request(&self) {
        if let Some(mut entry) = self.table.get_mut(&self.id) {
            entry.requests += 1;
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.table.remove(&self.id);
        metrics::connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Per-connection settings derived from the server configuration.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub read_buffer_size: usize,
    pub limits: ParserLimits,
    pub idle_timeout: Option<Duration>,
    pub access_log: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            read_buffer_size: config.limits.read_buffer_size,
            limits: ParserLimits::from(&config.limits),
            idle_timeout: config.timeouts.idle(),
            access_log: config.observability.access_log,
        }
    }
}

enum ReadOutcome {
    Request,
    Malformed(ParseError),
    /// Peer closed, or shutdown arrived, between requests.
    Finished,
}

/// One client connection over any transport stream.
pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    guard: ConnectionGuard,
    handler: Arc<dyn RequestHandler>,
    settings: Arc<ConnectionSettings>,
    shutdown: ShutdownSignal,
    buffer: Box<[u8]>,
    request: Request,
    parser: RequestParser,
    out: Vec<u8>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        guard: ConnectionGuard,
        handler: Arc<dyn RequestHandler>,
        settings: Arc<ConnectionSettings>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            buffer: vec![0; settings.read_buffer_size].into_boxed_slice(),
            parser: RequestParser::new(settings.limits),
            stream,
            peer,
            guard,
            handler,
            settings,
            shutdown,
            request: Request::new(),
            out: Vec::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    /// Serve requests until the connection ends. Consumes the connection;
    /// its table entry is gone when this returns.
    pub async fn run(mut self) {
        match self.serve().await {
            Ok(()) => tracing::trace!(connection_id = %self.id(), "Connection finished"),
            Err(e) => tracing::debug!(
                connection_id = %self.id(),
                peer_addr = %self.peer,
                error = %e,
                "Connection aborted"
            ),
        }
    }

    async fn serve(&mut self) -> io::Result<()> {
        loop {
            self.guard.set_state(ConnectionState::Reading);
            let outcome = self.read_request().await?;
            let started = Instant::now();
            self.guard.set_state(ConnectionState::Parsed);

            let (mut reply, keepalive) = match outcome {
                ReadOutcome::Finished => return Ok(()),
                ReadOutcome::Request => {
                    let keepalive = self.request.wants_keep_alive();
                    self.guard.set_state(ConnectionState::Dispatching);
                    (self.handler.handle_request(&self.request, keepalive), keepalive)
                }
                ReadOutcome::Malformed(reason) => {
                    tracing::debug!(
                        connection_id = %self.id(),
                        peer_addr = %self.peer,
                        %reason,
                        "Malformed request"
                    );
                    let mut reply = Reply::stock(StatusCode::BadRequest);
                    reply.close_connection();
                    (reply, false)
                }
            };

            self.guard.set_state(ConnectionState::Writing);
            self.write_reply(&mut reply).await?;
            self.guard.count_request();
            self.after_reply(&reply, started);

            if !keepalive {
                self.guard.set_state(ConnectionState::Closing);
                // Peer may already be gone; the reply is out either way.
                let _ = self.stream.shutdown().await;
                return Ok(());
            }
            self.reset();
        }
    }

    /// Read until the parser has a verdict. Leftover bytes after a
    /// complete request are dropped.
    async fn read_request(&mut self) -> io::Result<ReadOutcome> {
        loop {
            let n = self.read_some().await?;
            if n == 0 {
                if self.parser.is_idle() {
                    return Ok(ReadOutcome::Finished);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed mid-request",
                ));
            }
            match self.parser.feed(&mut self.request, &self.buffer[..n]) {
                ParseStatus::Complete => return Ok(ReadOutcome::Request),
                ParseStatus::Invalid(reason) => return Ok(ReadOutcome::Malformed(reason)),
                ParseStatus::Incomplete => continue,
            }
        }
    }

    /// One read. Between requests a shutdown reads as end of stream.
    async fn read_some(&mut self) -> io::Result<usize> {
        let idle_timeout = self.settings.idle_timeout;
        let read = read_with_timeout(&mut self.stream, &mut self.buffer, idle_timeout);
        if !self.parser.is_idle() {
            return read.await;
        }
        tokio::select! {
            n = read => n,
            _ = self.shutdown.recv() => Ok(0),
        }
    }

    async fn write_reply(&mut self, reply: &mut Reply) -> io::Result<()> {
        self.out.clear();
        reply.encode_into(&mut self.out);
        self.stream.write_all(&self.out).await?;
        self.stream.flush().await
    }

    fn after_reply(&self, reply: &Reply, started: Instant) {
        metrics::record_request(&self.request.method, reply.status.as_u16(), started);
        if self.settings.access_log {
            access::record(self.peer, &self.request, reply, started.elapsed());
        }
    }

    /// Clear request and parser state for the next keep-alive request.
    fn reset(&mut self) {
        self.request.clear();
        self.parser.reset();
    }
}

async fn read_with_timeout<S>(stream: &mut S, buf: &mut [u8], limit: Option<Duration>) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, stream.read(buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "idle timeout"))?,
        None => stream.read(buf).await,
    }
}
