use crate::config::{ConfigManager, ConfigOverrides, RegistryConfig};
use crate::error::{RegistryError, RegistryResult};
use crate::execution::ExecutorPool;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared configuration and execution resources for every handle one
/// registry mints.
///
/// Created once, eagerly, when the registry is constructed and closed exactly
/// once when the registry closes. Handles take a [`HandleLease`] on the
/// context while they are live so that closing the context can report handles
/// that were never released.
pub struct SharedServiceContext {
    /// Context instance ID
    pub system_id: Uuid,

    config: RegistryConfig,
    executor: Arc<ExecutorPool>,
    attached: Arc<AtomicUsize>,
    closed: AtomicBool,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for SharedServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedServiceContext")
            .field("system_id", &self.system_id)
            .field("environment", &self.config.environment)
            .field("executor", &self.executor)
            .field("attached_handles", &self.attached_handles())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SharedServiceContext {
    /// Build the context from an already merged configuration
    pub fn new(config: RegistryConfig) -> RegistryResult<Self> {
        config.validate()?;
        let executor = Arc::new(ExecutorPool::new(&config.executor)?);
        let system_id = Uuid::new_v4();

        info!(
            system_id = %system_id,
            environment = %config.environment,
            worker_threads = config.executor.worker_threads,
            "Shared service context created"
        );

        Ok(Self {
            system_id,
            config,
            executor,
            attached: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
            created_at: Utc::now(),
        })
    }

    /// Merge `overrides` onto the defaults and build the context
    pub fn from_overrides(overrides: &ConfigOverrides) -> RegistryResult<Self> {
        let manager = ConfigManager::load_with_overrides(overrides)?;
        Self::new(manager.into_config())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn executor(&self) -> Arc<ExecutorPool> {
        Arc::clone(&self.executor)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Run background work for a handle on the shared executor
    pub fn spawn<F>(&self, future: F) -> RegistryResult<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_closed() {
            return Err(RegistryError::Closed(format!(
                "shared service context {} is closed",
                self.system_id
            )));
        }
        self.executor.spawn(future)
    }

    /// Register a live handle against this context
    pub fn lease(&self) -> HandleLease {
        self.attached.fetch_add(1, Ordering::AcqRel);
        HandleLease {
            attached: Arc::clone(&self.attached),
        }
    }

    /// Handles holding a lease
    pub fn attached_handles(&self) -> usize {
        self.attached.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the context closed. Fails if handles are still attached; the
    /// context is closed either way. Shutting down the executor is left to the
    /// owner, which does so whether or not this succeeds.
    pub fn close(&self) -> RegistryResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let still_attached = self.attached_handles();
        if still_attached > 0 {
            warn!(
                system_id = %self.system_id,
                attached_handles = still_attached,
                "Shared service context closed with handles still attached"
            );
            return Err(RegistryError::Teardown {
                failures: vec![format!(
                    "shared service context {}: {still_attached} handle(s) still attached",
                    self.system_id
                )],
            });
        }

        info!(system_id = %self.system_id, "Shared service context closed");
        Ok(())
    }
}

/// Proof that a handle is attached to a [`SharedServiceContext`]. Dropping it detaches.
#[derive(Debug)]
pub struct HandleLease {
    attached: Arc<AtomicUsize>,
}

impl Drop for HandleLease {
    fn drop(&mut self) {
        self.attached.fetch_sub(1, Ordering::AcqRel);
    }
}
