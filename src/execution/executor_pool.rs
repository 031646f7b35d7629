//! Dedicated worker pool shared by every handle a registry mints.
//!
//! Backed by its own multi-threaded tokio runtime so that background work
//! (keep-alives and the like) is isolated from the caller's runtime and can be
//! cancelled wholesale. Shutdown is immediate: nothing spawned here is awaited.

use crate::config::ExecutorConfig;
use crate::error::{RegistryError, RegistryResult};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct ExecutorPool {
    thread_name: String,
    worker_threads: usize,
    runtime: Mutex<Option<Runtime>>,
    active: Arc<AtomicUsize>,
}

impl ExecutorPool {
    pub fn new(config: &ExecutorConfig) -> RegistryResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()?;

        info!(
            thread_name = %config.thread_name,
            worker_threads = config.worker_threads,
            "Executor pool started"
        );

        Ok(Self {
            thread_name: config.thread_name.clone(),
            worker_threads: config.worker_threads,
            runtime: Mutex::new(Some(runtime)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Spawn `future` onto the pool; fails once the pool has been shut down
    pub fn spawn<F>(&self, future: F) -> RegistryResult<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let slot = self.runtime.lock();
        let runtime = slot.as_ref().ok_or_else(|| {
            RegistryError::Closed(format!("executor pool '{}' is shut down", self.thread_name))
        })?;

        let guard = ActiveTaskGuard::enter(Arc::clone(&self.active));
        Ok(runtime.spawn(async move {
            let _guard = guard;
            future.await
        }))
    }

    /// Cancel everything immediately. Returns `false` if the pool was already shut down.
    pub fn shutdown_now(&self) -> bool {
        let Some(runtime) = self.runtime.lock().take() else {
            return false;
        };

        let pending = self.active.load(Ordering::Acquire);
        runtime.shutdown_background();
        info!(
            thread_name = %self.thread_name,
            cancelled_tasks = pending,
            "Executor pool shut down without waiting for in-flight work"
        );
        true
    }

    pub fn is_shutdown(&self) -> bool {
        self.runtime.lock().is_none()
    }

    /// Tasks spawned and not yet finished or dropped
    pub fn active_tasks(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }
}

impl std::fmt::Debug for ExecutorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorPool")
            .field("thread_name", &self.thread_name)
            .field("worker_threads", &self.worker_threads)
            .field("active_tasks", &self.active_tasks())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Drop for ExecutorPool {
    fn drop(&mut self) {
        if self.shutdown_now() {
            debug!(thread_name = %self.thread_name, "Executor pool dropped while running");
        }
    }
}

struct ActiveTaskGuard(Arc<AtomicUsize>);

impl ActiveTaskGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for ActiveTaskGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
