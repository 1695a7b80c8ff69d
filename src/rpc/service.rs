//! API services and their call descriptors.
//!
//! A service owns a method table built once at startup. Everything here is
//! read-only after construction and shared across connections.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

use crate::rpc::envelope::RpcError;
use crate::rpc::registry::RegistryError;

/// Outcome of one RPC handler.
pub type RpcResult = Result<Value, RpcError>;

/// Bound handler: receives the whole envelope and its `params`.
pub type Actor = Box<dyn Fn(&Value, &Value) -> RpcResult + Send + Sync>;

/// Required shape of `params`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamsReq {
    /// No constraint; `params` may also be absent.
    #[default]
    Any,
    Array,
    Object,
}

impl ParamsReq {
    pub fn accepts(self, params: &Value) -> bool {
        match self {
            ParamsReq::Any => true,
            ParamsReq::Array => params.is_array(),
            ParamsReq::Object => params.is_object(),
        }
    }
}

/// One registered method.
pub struct CallInfo {
    pub method: String,
    pub params_req: ParamsReq,
    actor: Actor,
}

impl CallInfo {
    pub fn invoke(&self, envelope: &Value, params: &Value) -> RpcResult {
        (self.actor)(envelope, params)
    }

    /// Reflection entry: `{method, paramsReq?}`.
    pub fn describe(&self) -> Value {
        match self.params_req {
            ParamsReq::Any => json!({ "method": self.method }),
            req => json!({ "method": self.method, "paramsReq": req }),
        }
    }
}

impl fmt::Debug for CallInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallInfo")
            .field("method", &self.method)
            .field("params_req", &self.params_req)
            .finish_non_exhaustive()
    }
}

/// Method name → descriptor, sorted by name.
#[derive(Debug, Default)]
pub struct MethodTable {
    calls: BTreeMap<String, CallInfo>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method. Names must be unique within a table.
    pub fn register<F>(&mut self, method: &str, params_req: ParamsReq, actor: F) -> Result<(), RegistryError>
    where
        F: Fn(&Value, &Value) -> RpcResult + Send + Sync + 'static,
    {
        if self.calls.contains_key(method) {
            return Err(RegistryError::DuplicateMethod(method.to_string()));
        }
        self.calls.insert(
            method.to_string(),
            CallInfo {
                method: method.to_string(),
                params_req,
                actor: Box::new(actor),
            },
        );
        Ok(())
    }

    pub fn get(&self, method: &str) -> Option<&CallInfo> {
        self.calls.get(method)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallInfo> {
        self.calls.values()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// A versioned JSON-RPC namespace mounted at one URI path.
pub trait ApiService: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn uri_path(&self) -> &str;
    fn methods(&self) -> &MethodTable;

    fn call_info(&self, method: &str) -> Option<&CallInfo> {
        self.methods().get(method)
    }

    /// Reflection: one entry per registered method.
    fn list_methods(&self) -> Value {
        Value::Array(self.methods().iter().map(CallInfo::describe).collect())
    }

    /// Execute one envelope.
    fn execute(&self, envelope: &Value) -> Value {
        crate::rpc::dispatch::execute_one(self, envelope)
    }
}

/// Table-driven service; the usual way to build an [`ApiService`].
#[derive(Debug)]
pub struct RpcService {
    name: String,
    version: String,
    uri_path: String,
    methods: MethodTable,
}

impl RpcService {
    pub fn new(name: impl Into<String>, version: impl Into<String>, uri_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            uri_path: uri_path.into(),
            methods: MethodTable::new(),
        }
    }

    pub fn register<F>(&mut self, method: &str, params_req: ParamsReq, actor: F) -> Result<(), RegistryError>
    where
        F: Fn(&Value, &Value) -> RpcResult + Send + Sync + 'static,
    {
        self.methods.register(method, params_req, actor)
    }
}

impl ApiService for RpcService {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn uri_path(&self) -> &str {
        &self.uri_path
    }

    fn methods(&self) -> &MethodTable {
        &self.methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_shape() {
        assert!(ParamsReq::Any.accepts(&Value::Null));
        assert!(ParamsReq::Array.accepts(&json!([])));
        assert!(!ParamsReq::Array.accepts(&json!({})));
        assert!(ParamsReq::Object.accepts(&json!({})));
        assert!(!ParamsReq::Object.accepts(&Value::Null));
    }

    #[test]
    fn duplicate_method_is_rejected() {
        let mut table = MethodTable::new();
        table.register("a", ParamsReq::Any, |_, _| Ok(Value::Null)).unwrap();
        let err = table.register("a", ParamsReq::Array, |_, _| Ok(Value::Null)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateMethod(m) if m == "a"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reflection_lists_every_method_once() {
        let mut svc = RpcService::new("t", "1", "/t/1");
        svc.register("sum", ParamsReq::Array, |_, _| Ok(json!(0))).unwrap();
        svc.register("ping", ParamsReq::Any, |_, _| Ok(json!("pong"))).unwrap();
        svc.register("config", ParamsReq::Object, |_, _| Ok(json!({}))).unwrap();

        assert_eq!(
            svc.list_methods(),
            json!([
                {"method": "config", "paramsReq": "object"},
                {"method": "ping"},
                {"method": "sum", "paramsReq": "array"},
            ])
        );
    }
}
