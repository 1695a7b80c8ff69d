//! JSON-RPC execution against one service.
//!
//! Failures at this level never become HTTP errors: every outcome is a
//! JSON-RPC envelope delivered with `200 OK`.

use serde_json::Value;

use crate::observability::metrics;
use crate::rpc::envelope::{jrpc_err, jrpc_ok, RpcError};
use crate::rpc::service::ApiService;

/// Execute a single envelope.
pub fn execute_one<S>(service: &S, envelope: &Value) -> Value
where
    S: ApiService + ?Sized,
{
    let method = match envelope.get("method").and_then(Value::as_str) {
        Some(method) if envelope.is_object() => method,
        _ => {
            metrics::record_rpc_call(service.name(), "-", "invalid_request");
            return jrpc_err(envelope, &RpcError::invalid_request());
        }
    };

    let Some(call) = service.call_info(method) else {
        tracing::debug!(service = service.name(), method, "Unknown RPC method");
        metrics::record_rpc_call(service.name(), "-", "method_not_found");
        return jrpc_err(envelope, &RpcError::method_not_found());
    };

    let params = envelope.get("params").unwrap_or(&Value::Null);
    if !call.params_req.accepts(params) {
        metrics::record_rpc_call(service.name(), &call.method, "invalid_params");
        return jrpc_err(envelope, &RpcError::invalid_params());
    }

    match call.invoke(envelope, params) {
        Ok(result) => {
            metrics::record_rpc_call(service.name(), &call.method, "ok");
            jrpc_ok(envelope, result)
        }
        Err(error) => {
            tracing::debug!(service = service.name(), method, %error, "RPC handler failed");
            metrics::record_rpc_call(service.name(), &call.method, "error");
            jrpc_err(envelope, &error)
        }
    }
}

/// Execute every envelope of a batch independently, preserving order.
pub fn execute_batch<S>(service: &S, batch: &[Value]) -> Value
where
    S: ApiService + ?Sized,
{
    Value::Array(batch.iter().map(|envelope| service.execute(envelope)).collect())
}

/// Top-level entry for a raw request body.
pub fn execute<S>(service: &S, body: &[u8]) -> Value
where
    S: ApiService + ?Sized,
{
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(batch)) => execute_batch(service, &batch),
        Ok(envelope) => service.execute(&envelope),
        Err(e) => {
            tracing::debug!(service = service.name(), error = %e, "Unparsable JSON-RPC body");
            jrpc_err(&Value::Null, &RpcError::parse_error())
        }
    }
}
