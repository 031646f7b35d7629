//! # Service Registry
//!
//! Thread-safe cache of service handles keyed by [`TargetDescriptor`], plus the
//! lifecycle of the shared context those handles run on.
//!
//! ## Guarantees
//!
//! - **At most one handle per target**: lookup, construction, initialization
//!   and insertion run under one lock, so concurrent requests for the same
//!   target observe a single construction.
//! - **No partial entries**: a handle whose initialization fails is never
//!   cached; the next request constructs a fresh one.
//! - **One-way close**: after [`ServiceRegistry::close`] every operation except
//!   `close`, `is_closed` and `stats` fails with [`RegistryError::Closed`].
//! - **Complete teardown**: close attempts every handle, then always closes
//!   the shared context, shuts down its executor and clears the cache, even
//!   when earlier steps failed.
//!
//! ## Usage
//!
//! ```rust
//! use tasker_connection_registry::registry::ServiceRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ServiceRegistry::new()?;
//!
//! let first = registry.get_or_create_handle("tasker:none;test=true", None).await?;
//! let again = registry.get_or_create_handle("tasker:NONE", None).await?;
//! assert!(Arc::ptr_eq(&first, &again));
//!
//! registry.close().await?;
//! assert!(first.is_closed());
//! # Ok(())
//! # }
//! ```

use super::connection::RegistryConnection;
use crate::config::{ConfigManager, ConfigOverrides, RegistryConfig};
use crate::context::SharedServiceContext;
use crate::error::{RegistryError, RegistryResult};
use crate::log_registry;
use crate::services::{
    ConnectionOptions, DefaultHandleFactory, ServiceHandle, ServiceHandleFactory,
};
use crate::target::{self, TargetDescriptor, TargetMode};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Snapshot of registry state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub closed: bool,
    pub cached_handles: usize,
    pub offline_handles: usize,
    pub networked_handles: usize,
}

#[derive(Default)]
struct RegistryState {
    closed: bool,
    cache: HashMap<TargetDescriptor, Arc<dyn ServiceHandle>>,
}

pub struct ServiceRegistry {
    overrides: ConfigOverrides,
    context: Arc<SharedServiceContext>,
    factory: Arc<dyn ServiceHandleFactory>,
    state: Mutex<RegistryState>,
}

impl ServiceRegistry {
    /// Registry with default configuration and handle variants
    pub fn new() -> RegistryResult<Self> {
        Self::with_overrides(ConfigOverrides::new())
    }

    /// Registry whose shared context is built from defaults merged with `overrides`
    pub fn with_overrides(overrides: ConfigOverrides) -> RegistryResult<Self> {
        Self::with_factory(overrides, Arc::new(DefaultHandleFactory))
    }

    /// Registry that builds handles through `factory`
    pub fn with_factory(
        overrides: ConfigOverrides,
        factory: Arc<dyn ServiceHandleFactory>,
    ) -> RegistryResult<Self> {
        let context = SharedServiceContext::from_overrides(&overrides)?;
        Ok(Self::assemble(overrides, context, factory))
    }

    /// Registry configured from the file at `path`, the environment and `overrides`
    pub fn with_config_file<P: AsRef<Path>>(
        path: P,
        overrides: ConfigOverrides,
    ) -> RegistryResult<Self> {
        let manager = ConfigManager::load_from_file(path, &overrides)?;
        let context = SharedServiceContext::new(manager.into_config())?;
        Ok(Self::assemble(overrides, context, Arc::new(DefaultHandleFactory)))
    }

    /// Registry over an already merged configuration; no further layers apply
    pub fn from_config(
        config: RegistryConfig,
        factory: Arc<dyn ServiceHandleFactory>,
    ) -> RegistryResult<Self> {
        let context = SharedServiceContext::new(config)?;
        Ok(Self::assemble(ConfigOverrides::new(), context, factory))
    }

    fn assemble(
        overrides: ConfigOverrides,
        context: SharedServiceContext,
        factory: Arc<dyn ServiceHandleFactory>,
    ) -> Self {
        info!(
            system_id = %context.system_id,
            environment = %context.config().environment,
            overrides = overrides.len(),
            factory = ?factory,
            "Service registry created"
        );

        Self {
            overrides,
            context: Arc::new(context),
            factory,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Overrides this registry was created with
    pub fn overrides(&self) -> &ConfigOverrides {
        &self.overrides
    }

    /// Whether this registry should be consulted for `target` at all
    pub fn accepts_target(&self, target: &str) -> bool {
        target::accepts_target(target)
    }

    pub async fn shared_context(&self) -> RegistryResult<Arc<SharedServiceContext>> {
        let state = self.state.lock().await;
        Self::ensure_open(&state)?;
        Ok(Arc::clone(&self.context))
    }

    /// Return the cached handle for `target`, constructing and initializing
    /// one on first use
    pub async fn get_or_create_handle(
        &self,
        target: &str,
        options: Option<ConnectionOptions>,
    ) -> RegistryResult<Arc<dyn ServiceHandle>> {
        let mut state = self.state.lock().await;
        Self::ensure_open(&state)?;
        let (_, handle) = self.resolve_handle(&mut state, target, options).await?;
        Ok(handle)
    }

    /// Open a client connection backed by the shared handle for `target`.
    ///
    /// Closing the returned connection never closes the handle.
    pub async fn connect(
        &self,
        target: &str,
        options: Option<ConnectionOptions>,
    ) -> RegistryResult<RegistryConnection> {
        let mut state = self.state.lock().await;
        Self::ensure_open(&state)?;

        let options = options.unwrap_or_default();
        let (descriptor, handle) = self
            .resolve_handle(&mut state, target, Some(options.clone()))
            .await?;
        let connection_options = options.overlaid_on(descriptor.attributes());

        log_registry!(debug, "connect", descriptor: descriptor.to_string(), handle_id: handle.id());
        Ok(RegistryConnection::new(target, handle, connection_options))
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.lock().await;
        let offline_handles = state
            .cache
            .values()
            .filter(|handle| handle.mode() == TargetMode::Offline)
            .count();

        RegistryStats {
            closed: state.closed,
            cached_handles: state.cache.len(),
            offline_handles,
            networked_handles: state.cache.len() - offline_handles,
        }
    }

    /// Close every cached handle and release the shared context.
    ///
    /// Only the first call does anything. Every teardown step runs even if an
    /// earlier one failed; all failures are reported together afterwards.
    pub async fn close(&self) -> RegistryResult<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            debug!(system_id = %self.context.system_id, "Service registry already closed");
            return Ok(());
        }
        state.closed = true;
        log_registry!(info, "close", system_id: self.context.system_id, cached_handles: state.cache.len());

        let mut failures = Vec::new();
        for (descriptor, handle) in state.cache.iter() {
            if let Err(e) = handle.close().await {
                warn!(
                    descriptor = %descriptor,
                    handle_id = %handle.id(),
                    error = %e,
                    "Failed to close service handle; continuing teardown"
                );
                failures.push(format!("{descriptor}: {e}"));
            }
        }

        let executor = self.context.executor();
        if let Err(e) = self.context.close() {
            warn!(system_id = %self.context.system_id, error = %e, "Failed to close shared service context");
            match e {
                RegistryError::Teardown { failures: inner } => failures.extend(inner),
                other => failures.push(other.to_string()),
            }
        }
        executor.shutdown_now();
        state.cache.clear();

        if failures.is_empty() {
            info!(system_id = %self.context.system_id, "Service registry closed");
            Ok(())
        } else {
            error!(
                system_id = %self.context.system_id,
                failures = failures.len(),
                "Service registry closed with teardown failures"
            );
            Err(RegistryError::Teardown { failures })
        }
    }

    fn ensure_open(state: &RegistryState) -> RegistryResult<()> {
        if state.closed {
            return Err(RegistryError::Closed(
                "the service registry has been closed".to_string(),
            ));
        }
        Ok(())
    }

    /// Cache lookup and miss path; the caller holds the state lock throughout
    async fn resolve_handle(
        &self,
        state: &mut RegistryState,
        target: &str,
        options: Option<ConnectionOptions>,
    ) -> RegistryResult<(TargetDescriptor, Arc<dyn ServiceHandle>)> {
        let descriptor = TargetDescriptor::parse(target)?;

        if let Some(handle) = state.cache.get(&descriptor) {
            debug!(descriptor = %descriptor, handle_id = %handle.id(), "Service handle cache hit");
            return Ok((descriptor, Arc::clone(handle)));
        }

        let options = options.unwrap_or_default();
        let mode = descriptor.mode();
        let handle = self
            .factory
            .create(mode, &self.context, &descriptor, &options)?;

        if let Err(e) = handle.init(target, &options).await {
            warn!(descriptor = %descriptor, mode = %mode, error = %e, "Service handle initialization failed");
            return Err(match e {
                RegistryError::HandleInit { .. } => e,
                other => RegistryError::handle_init(target, other.to_string()),
            });
        }

        state.cache.insert(descriptor.clone(), Arc::clone(&handle));
        log_registry!(info, "handle_created", descriptor: descriptor.to_string(), mode: mode, handle_id: handle.id(), cached_handles: state.cache.len());
        Ok((descriptor, handle))
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("system_id", &self.context.system_id)
            .field("overrides", &self.overrides)
            .field("factory", &self.factory)
            .finish()
    }
}
