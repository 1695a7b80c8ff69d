//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → transport.rs / tls.rs (identity or TLS handshake)
//!     → connection.rs (lifecycle tracking, state machine)
//!     → http::handler (request → reply)
//!
//! Connection States:
//!     Accepted → [Handshaking] → Reading → Parsed → Dispatching → Writing
//!         → Reading (keep-alive) | Closing → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The connection code is generic over the stream; plaintext and TLS
//!   differ only in the handshake

pub mod connection;
pub mod listener;
pub mod tls;
pub mod transport;

pub use connection::{Connection, ConnectionId, ConnectionSettings, ConnectionState, ConnectionTracker};
pub use listener::{Listener, ListenerError};
pub use transport::{Plaintext, Transport};
