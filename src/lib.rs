//! JSON-RPC 2.0 over HTTP/1.x server library.
//!
//! Versioned API services register with a [`Registry`] under a URL path;
//! [`HttpServer`] accepts plaintext or TLS connections and routes
//! requests to them.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use rpc::Registry;
