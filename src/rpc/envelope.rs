//! JSON-RPC 2.0 envelopes and error codes.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Version tag carried by every response.
pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
/// Used when a handler fails without a more specific code.
pub const HANDLER_FAILED: i64 = -32603;

/// A JSON-RPC error object.
///
/// Handlers return this to signal failure; the dispatcher wraps it in an
/// error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "JSON parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid request object")
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "method not found")
    }

    pub fn invalid_params() -> Self {
        Self::new(INVALID_PARAMS, "Invalid params")
    }

    /// Generic handler failure.
    pub fn failed() -> Self {
        Self::new(HANDLER_FAILED, "RPC failed")
    }
}

/// The request's `id`, or `null` when absent or unrecoverable.
pub fn request_id(request: &Value) -> Value {
    request.get("id").cloned().unwrap_or(Value::Null)
}

/// Successful response echoing the request's id.
pub fn jrpc_ok(request: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "result": result,
        "id": request_id(request),
    })
}

/// Error response echoing the request's id.
pub fn jrpc_err(request: &Value, error: &RpcError) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "error": error,
        "id": request_id(request),
    })
}
