//! Handle for targets that never reach a backend.
//!
//! Everything the session needs lives in memory: the resolved session
//! properties are kept in a concurrent map that callers may read and extend
//! while the handle is open.

use super::{ConnectionOptions, HandleLifecycle, HandleState, ServiceHandle};
use crate::context::{HandleLease, SharedServiceContext};
use crate::error::{RegistryError, RegistryResult};
use crate::target::TargetDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug)]
pub struct OfflineServiceHandle {
    id: Uuid,
    descriptor: TargetDescriptor,
    context: Arc<SharedServiceContext>,
    options: ConnectionOptions,
    lifecycle: HandleLifecycle,
    session: DashMap<String, String>,
    lease: Mutex<Option<HandleLease>>,
    created_at: DateTime<Utc>,
}

impl OfflineServiceHandle {
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
            session: DashMap::new(),
            lease: Mutex::new(Some(lease)),
            created_at: Utc::now(),
        }
    }

    pub fn session_property(&self, key: &str) -> Option<String> {
        self.session.get(key).map(|entry| entry.value().clone())
    }

    /// Snapshot of the current session properties
    pub fn session_properties(&self) -> BTreeMap<String, String> {
        self.session
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Record a session property; rejected once the handle is closed
    pub fn set_session_property(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> RegistryResult<()> {
        if self.lifecycle.state() == HandleState::Closed {
            return Err(RegistryError::Closed(format!(
                "offline handle {} is closed",
                self.id
            )));
        }
        self.session.insert(key.into(), value.into());
        Ok(())
    }

    pub fn context(&self) -> &Arc<SharedServiceContext> {
        &self.context
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[async_trait]
impl ServiceHandle for OfflineServiceHandle {
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
        for (key, value) in resolved.iter() {
            self.session.insert(key.to_string(), value.to_string());
        }

        if !self.lifecycle.mark_initialized() {
            return Err(RegistryError::handle_init(
                target,
                "handle was closed during initialization",
            ));
        }

        info!(
            handle_id = %self.id,
            descriptor = %self.descriptor,
            session_properties = self.session.len(),
            "Offline service handle initialized"
        );
        Ok(())
    }

    async fn close(&self) -> RegistryResult<()> {
        if !self.lifecycle.mark_closed() {
            debug!(handle_id = %self.id, "Offline service handle already closed");
            return Ok(());
        }

        self.session.clear();
        self.lease.lock().take();
        info!(handle_id = %self.id, descriptor = %self.descriptor, "Offline service handle closed");
        Ok(())
    }
}
