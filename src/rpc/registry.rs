//! Service registry keyed by URI path.
//!
//! Built during startup and then shared read-only (behind an `Arc`) by all
//! connections; there is no runtime re-registration.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use thiserror::Error;

use crate::rpc::service::ApiService;

/// Errors raised while assembling services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("path '{0}' is already served by another service")]
    DuplicatePath(String),

    #[error("service {name}/{version} is already registered")]
    DuplicateService { name: String, version: String },

    #[error("invalid service path '{0}': must start with '/' and must not be '/'")]
    InvalidPath(String),

    #[error("method '{0}' is already registered")]
    DuplicateMethod(String),
}

/// All API services exported by this server, in registration order.
#[derive(Default)]
pub struct Registry {
    services: Vec<Arc<dyn ApiService>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service. Its path and its name/version pair must both be new.
    pub fn register<S>(&mut self, service: S) -> Result<(), RegistryError>
    where
        S: ApiService + 'static,
    {
        let path = service.uri_path();
        if !path.starts_with('/') || path == "/" {
            return Err(RegistryError::InvalidPath(path.to_string()));
        }
        if self.get(path).is_some() {
            return Err(RegistryError::DuplicatePath(path.to_string()));
        }
        if self
            .services
            .iter()
            .any(|s| s.name() == service.name() && s.version() == service.version())
        {
            return Err(RegistryError::DuplicateService {
                name: service.name().to_string(),
                version: service.version().to_string(),
            });
        }

        tracing::debug!(
            service = service.name(),
            version = service.version(),
            path,
            methods = service.methods().len(),
            "Service registered"
        );
        self.services.push(Arc::new(service));
        Ok(())
    }

    /// Service mounted at exactly `path`.
    pub fn get(&self, path: &str) -> Option<&dyn ApiService> {
        self.services
            .iter()
            .find(|s| s.uri_path() == path)
            .map(|s| &**s)
    }

    pub fn services(&self) -> impl Iterator<Item = &dyn ApiService> {
        self.services.iter().map(|s| &**s)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Discovery document: `[{name, endpoint, timestamp}]`.
    pub fn discovery(&self) -> Value {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Value::Array(
            self.services()
                .map(|s| {
                    json!({
                        "name": format!("{}/{}", s.name(), s.version()),
                        "endpoint": s.uri_path(),
                        "timestamp": timestamp,
                    })
                })
                .collect(),
        )
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.services.iter().map(|s| s.uri_path()))
            .finish()
    }
}
