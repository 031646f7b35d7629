//! Handle for targets backed by a live service.
//!
//! Initialization resolves the session settings (handle defaults from the
//! shared configuration, overridden per connection) and starts a keep-alive
//! loop on the shared executor. The keep-alive is the handle's only
//! background work and is aborted on close; if the executor is shut down
//! first, it simply stops.

use super::{ConnectionOptions, HandleLifecycle, HandleState, ServiceHandle};
use crate::context::{HandleLease, SharedServiceContext};
use crate::error::{RegistryError, RegistryResult};
use crate::target::TargetDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub const CONNECT_TIMEOUT_OPTION: &str = "connect_timeout_ms";
pub const KEEPALIVE_INTERVAL_OPTION: &str = "keepalive_interval_ms";

/// Session settings resolved at init time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl SessionSettings {
    fn resolve(
        context: &SharedServiceContext,
        target: &str,
        options: &ConnectionOptions,
    ) -> RegistryResult<Self> {
        let config = context.config();
        let connect_timeout = options
            .get_u64(CONNECT_TIMEOUT_OPTION)
            .map_err(|reason| RegistryError::handle_init(target, reason))?
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.connect_timeout());
        let keepalive_interval = options
            .get_u64(KEEPALIVE_INTERVAL_OPTION)
            .map_err(|reason| RegistryError::handle_init(target, reason))?
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.keepalive_interval());

        if keepalive_interval.is_zero() {
            return Err(RegistryError::handle_init(
                target,
                format!("{KEEPALIVE_INTERVAL_OPTION} must be greater than zero"),
            ));
        }

        Ok(Self {
            connect_timeout,
            keepalive_interval,
        })
    }
}

#[derive(Debug)]
pub struct NetworkedServiceHandle {
    id: Uuid,
    descriptor: TargetDescriptor,
    context: Arc<SharedServiceContext>,
    options: ConnectionOptions,
    lifecycle: HandleLifecycle,
    settings: Mutex<Option<SessionSettings>>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
    heartbeats: Arc<AtomicU64>,
    lease: Mutex<Option<HandleLease>>,
    created_at: DateTime<Utc>,
}

impl NetworkedServiceHandle {
    pub fn new(
        context: Arc<SharedServiceContext>,
        descriptor: TargetDescriptor,
        options: ConnectionOptions,
    ) -> Self {
        let lease = context.lease();
        Self {
            id: Uuid::new_v4(),
            descriptor,
            context,
            options,
            lifecycle: HandleLifecycle::new(),
            settings: Mutex::new(None),
            keepalive: Mutex::new(None),
            heartbeats: Arc::new(AtomicU64::new(0)),
            lease: Mutex::new(Some(lease)),
            created_at: Utc::now(),
        }
    }

    /// Settings in effect; `None` until initialized
    pub fn session_settings(&self) -> Option<SessionSettings> {
        *self.settings.lock()
    }

    /// Keep-alive ticks delivered so far
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Acquire)
    }

    pub fn has_keepalive(&self) -> bool {
        self.keepalive
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn context(&self) -> &Arc<SharedServiceContext> {
        &self.context
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[async_trait]
impl ServiceHandle for NetworkedServiceHandle {
    fn id(&self) -> Uuid {
        self.id
    }

    fn descriptor(&self) -> &TargetDescriptor {
        &self.descriptor
    }

    fn state(&self) -> HandleState {
        self.lifecycle.state()
    }

    async fn init(&self, target: &str, options: &ConnectionOptions) -> RegistryResult<()> {
        self.lifecycle.ensure_initializable(target)?;

        let base = self.options.overlaid_on(self.descriptor.attributes());
        let resolved = options.overlaid_on(&base.into_inner());
        let settings = SessionSettings::resolve(&self.context, target, &resolved)?;

        let heartbeats = Arc::clone(&self.heartbeats);
        let interval = settings.keepalive_interval;
        let task = self
            .context
            .spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    heartbeats.fetch_add(1, Ordering::AcqRel);
                }
            })
            .map_err(|e| RegistryError::handle_init(target, format!("keep-alive not started: {e}")))?;

        *self.settings.lock() = Some(settings);
        *self.keepalive.lock() = Some(task);

        if !self.lifecycle.mark_initialized() {
            if let Some(task) = self.keepalive.lock().take() {
                task.abort();
            }
            return Err(RegistryError::handle_init(
                target,
                "handle was closed during initialization",
            ));
        }

        info!(
            handle_id = %self.id,
            descriptor = %self.descriptor,
            quorum_size = self.descriptor.quorum().len(),
            connect_timeout_ms = settings.connect_timeout.as_millis() as u64,
            keepalive_interval_ms = settings.keepalive_interval.as_millis() as u64,
            "Networked service handle initialized"
        );
        Ok(())
    }

    async fn close(&self) -> RegistryResult<()> {
        if !self.lifecycle.mark_closed() {
            debug!(handle_id = %self.id, "Networked service handle already closed");
            return Ok(());
        }

        if let Some(task) = self.keepalive.lock().take() {
            task.abort();
        }
        self.lease.lock().take();

        info!(
            handle_id = %self.id,
            descriptor = %self.descriptor,
            heartbeats = self.heartbeats(),
            "Networked service handle closed"
        );
        Ok(())
    }
}
