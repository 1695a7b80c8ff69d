//! Transport capability shared by plaintext and TLS connections.
//!
//! The connection state machine is written once, generic over
//! [`Transport::Stream`]. A transport only decides how an accepted TCP
//! stream becomes that byte stream.

use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Turns an accepted TCP stream into the stream a connection speaks over.
pub trait Transport: Clone + Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Whether connections pass through a handshake first.
    fn is_secure(&self) -> bool;

    /// Complete any protocol setup. On error nothing may be written back.
    fn handshake(&self, tcp: TcpStream) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP; the handshake is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl Transport for Plaintext {
    type Stream = TcpStream;

    fn is_secure(&self) -> bool {
        false
    }

    fn handshake(&self, tcp: TcpStream) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        std::future::ready(Ok(tcp))
    }
}
