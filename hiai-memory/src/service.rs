//! Process-wide composition root: one store handle plus its tool registry.
//!
//! Tool handlers are synchronous and may touch the disk, so async hosts
//! dispatch them through [`MemoryService::call`], which runs each call on the
//! blocking pool. Concurrent calls serialize on the store's connection lock.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::memory::MemoryStore;
use crate::tools::{ToolRegistry, ToolSpec};
use serde_json::Value;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Long-lived memory service.
pub struct MemoryService {
    store: Arc<MemoryStore>,
    registry: Arc<ToolRegistry>,
}

impl MemoryService {
    /// Open the store described by `config` and register every tool.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let store = MemoryStore::open_with_config(&config)?;
        Ok(Self::with_store(store, &config))
    }

    /// Build the service around an already opened store.
    pub fn with_store(store: MemoryStore, config: &StoreConfig) -> Self {
        let store = Arc::new(store);
        let registry = ToolRegistry::with_memory_tools(Arc::clone(&store), config);
        info!(tools = registry.len(), "Memory service ready");

        Self {
            store,
            registry: Arc::new(registry),
        }
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Tool definitions, ordered by name.
    pub fn tools(&self) -> Vec<&ToolSpec> {
        self.registry.specs().collect()
    }

    /// Tool listing suitable for advertising to a host.
    pub fn export_schema(&self) -> Value {
        self.registry.export_schema()
    }

    /// Execute a tool on the blocking pool.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        let registry = Arc::clone(&self.registry);
        let name = name.to_string();

        tokio::task::spawn_blocking(move || registry.execute(&name, args))
            .await
            .map_err(|e| Error::Internal(format!("Tool task failed: {}", e)))?
    }

    /// Wait for a termination signal, then close the store.
    pub async fn run_until_shutdown(self) -> Result<()> {
        shutdown_signal().await;
        self.shutdown()
    }

    /// Flush and close the store.
    ///
    /// Fails if a tool call is still holding the store.
    pub fn shutdown(self) -> Result<()> {
        let Self { store, registry } = self;
        drop(registry);

        let store = Arc::try_unwrap(store)
            .map_err(|_| Error::Internal("Store still in use at shutdown".to_string()))?;
        store.close()
    }
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
