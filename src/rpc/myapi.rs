//! The `myapi` v1 service, mounted at `/rpc/1`.

use serde_json::{json, Value};

use crate::rpc::registry::RegistryError;
use crate::rpc::service::{ParamsReq, RpcResult, RpcService};

pub const NAME: &str = "myapi";
pub const VERSION: &str = "1";
pub const PATH: &str = "/rpc/1";

/// Build the service with its method table.
pub fn service() -> Result<RpcService, RegistryError> {
    let mut svc = RpcService::new(NAME, VERSION, PATH);
    svc.register("ping", ParamsReq::Any, ping)?;
    svc.register("echo", ParamsReq::Any, echo)?;
    Ok(svc)
}

fn ping(_request: &Value, _params: &Value) -> RpcResult {
    Ok(json!("pong"))
}

/// Returns `params` unchanged; `null` when absent.
fn echo(_request: &Value, params: &Value) -> RpcResult {
    Ok(params.clone())
}
