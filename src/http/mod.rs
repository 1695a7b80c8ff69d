//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! bytes from the connection
//!     → parser.rs (incremental, fills request.rs)
//!     → handler.rs (route: discovery, reflection, JSON-RPC)
//!     → reply.rs (status line, headers, body)
//!     → bytes back to the connection
//! ```
//!
//! server.rs owns the accept loop that creates connections.

pub mod handler;
pub mod parser;
pub mod reply;
pub mod request;
pub mod server;

pub use handler::{RequestHandler, RpcRequestHandler};
pub use parser::{ParseError, ParseStatus, RequestParser};
pub use reply::{Reply, StatusCode};
pub use request::{Header, Request};
pub use server::{HttpServer, ServerError};
