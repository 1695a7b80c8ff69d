//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the worker pool every connection runs on
//! - Assemble the service registry
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Services are registered before the first accept

use tokio::runtime::{Builder, Runtime};

use crate::config::schema::RuntimeConfig;
use crate::rpc::{myapi, Registry, RegistryError};

/// Multi-threaded runtime with `worker_threads` workers.
pub fn build_runtime(config: &RuntimeConfig) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .thread_name("rpcsrv-worker")
        .enable_all()
        .build()
}

/// Registry holding every service this server exports.
pub fn default_registry() -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    registry.register(myapi::service()?)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_serves_myapi() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(myapi::PATH).is_some());
    }

    #[test]
    fn runtime_uses_configured_pool() {
        let runtime = build_runtime(&RuntimeConfig { worker_threads: 2 }).unwrap();
        assert_eq!(runtime.metrics().num_workers(), 2);
    }
}
