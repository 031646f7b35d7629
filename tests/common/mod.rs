//! Shared fixtures for registry integration tests.
//!
//! `MockHandleFactory` counts constructions and can be told to fail
//! construction, initialization or close so tests can observe the registry's
//! behavior around each failure point.

#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasker_connection_registry::context::HandleLease;
use tasker_connection_registry::services::HandleLifecycle;
use tasker_connection_registry::{
    ConfigOverrides, ConnectionOptions, HandleState, RegistryError, RegistryResult,
    ServiceHandle, ServiceHandleFactory, ServiceRegistry, SharedServiceContext,
    TargetDescriptor, TargetMode,
};
use uuid::Uuid;

pub fn test_overrides() -> ConfigOverrides {
    ConfigOverrides::new()
        .with("environment", "test")
        .with("executor.worker_threads", "1")
        .with("executor.thread_name", "registry-it")
}

pub fn registry_with(factory: Arc<MockHandleFactory>) -> ServiceRegistry {
    ServiceRegistry::with_factory(test_overrides(), factory).expect("registry should build")
}

#[derive(Debug)]
pub struct MockHandle {
    id: Uuid,
    descriptor: TargetDescriptor,
    mode: TargetMode,
    options: ConnectionOptions,
    lifecycle: HandleLifecycle,
    init_delay: Duration,
    fail_init: bool,
    fail_close: bool,
    init_calls: AtomicUsize,
    close_calls: AtomicUsize,
    lease: Mutex<Option<HandleLease>>,
}

impl MockHandle {
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn construction_mode(&self) -> TargetMode {
        self.mode
    }

    pub fn construction_options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn holds_lease(&self) -> bool {
        self.lease.lock().is_some()
    }
}

#[async_trait]
impl ServiceHandle for MockHandle {
    fn id(&self) -> Uuid {
        self.id
    }

    fn descriptor(&self) -> &TargetDescriptor {
        &self.descriptor
    }

    fn state(&self) -> HandleState {
        self.lifecycle.state()
    }

    async fn init(&self, target: &str, _options: &ConnectionOptions) -> RegistryResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        if self.fail_init {
            return Err(RegistryError::handle_init(target, "simulated init failure"));
        }
        self.lifecycle.mark_initialized();
        Ok(())
    }

    async fn close(&self) -> RegistryResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(RegistryError::Backend(format!(
                "simulated close failure for {}",
                self.descriptor
            )));
        }
        self.lifecycle.mark_closed();
        self.lease.lock().take();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockHandleFactory {
    constructions: AtomicUsize,
    fail_next_constructions: AtomicUsize,
    fail_next_inits: AtomicUsize,
    fail_close_hosts: Mutex<HashSet<String>>,
    hold_leases: AtomicBool,
    init_delay: Mutex<Duration>,
    created: Mutex<Vec<Arc<MockHandle>>>,
}

impl MockHandleFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_init_delay(delay: Duration) -> Arc<Self> {
        let factory = Self::default();
        *factory.init_delay.lock() = delay;
        Arc::new(factory)
    }

    pub fn fail_next_constructions(&self, count: usize) {
        self.fail_next_constructions.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_inits(&self, count: usize) {
        self.fail_next_inits.store(count, Ordering::SeqCst);
    }

    /// Handles whose quorum contains `host` fail to close
    pub fn fail_close_for_host(&self, host: &str) {
        self.fail_close_hosts.lock().insert(host.to_string());
    }

    /// Handles built from now on attach to the shared context until closed
    pub fn hold_leases(&self) {
        self.hold_leases.store(true, Ordering::SeqCst);
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<Arc<MockHandle>> {
        self.created.lock().clone()
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ServiceHandleFactory for MockHandleFactory {
    fn create(
        &self,
        mode: TargetMode,
        context: &Arc<SharedServiceContext>,
        descriptor: &TargetDescriptor,
        options: &ConnectionOptions,
    ) -> RegistryResult<Arc<dyn ServiceHandle>> {
        if Self::take_one(&self.fail_next_constructions) {
            return Err(RegistryError::Backend(
                "simulated construction failure".to_string(),
            ));
        }

        self.constructions.fetch_add(1, Ordering::SeqCst);
        let fail_close = {
            let hosts = self.fail_close_hosts.lock();
            descriptor.quorum().iter().any(|host| hosts.contains(host))
        };

        let handle = Arc::new(MockHandle {
            id: Uuid::new_v4(),
            descriptor: descriptor.clone(),
            mode,
            options: options.clone(),
            lifecycle: HandleLifecycle::new(),
            init_delay: *self.init_delay.lock(),
            fail_init: Self::take_one(&self.fail_next_inits),
            fail_close,
            init_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            lease: Mutex::new(
                self.hold_leases
                    .load(Ordering::SeqCst)
                    .then(|| context.lease()),
            ),
        });
        self.created.lock().push(Arc::clone(&handle));
        Ok(handle)
    }
}
