//! JSON-RPC subsystem.
//!
//! # Data Flow
//! ```text
//! POST <service-path> body
//!     → dispatch.rs (JSON parse; batch or single)
//!     → service.rs (method lookup, params shape check, handler call)
//!     → envelope.rs (result / error envelope, id echoed)
//!
//! GET <service-path>  → service.rs list_methods (reflection)
//! GET /               → registry.rs discovery
//! ```
//!
//! # Design Decisions
//! - Registry is built explicitly at startup and passed down; no globals
//! - Services are trait objects keyed by URI path
//! - RPC-level failures are envelopes, never HTTP errors

pub mod dispatch;
pub mod envelope;
pub mod myapi;
pub mod registry;
pub mod service;

pub use envelope::{jrpc_err, jrpc_ok, RpcError};
pub use registry::{Registry, RegistryError};
pub use service::{ApiService, CallInfo, MethodTable, ParamsReq, RpcResult, RpcService};
