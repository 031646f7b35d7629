use crate::services::{ConnectionOptions, HandleState, ServiceHandle};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Short-lived client connection sharing a registry-owned service handle.
///
/// The connection borrows the handle; closing or dropping it leaves the
/// handle untouched. A connection also reports closed once the registry has
/// closed the underlying handle.
#[derive(Debug)]
pub struct RegistryConnection {
    id: Uuid,
    target: String,
    handle: Arc<dyn ServiceHandle>,
    options: ConnectionOptions,
    opened_at: DateTime<Utc>,
    closed: AtomicBool,
}

impl RegistryConnection {
    pub(crate) fn new(
        target: &str,
        handle: Arc<dyn ServiceHandle>,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.to_string(),
            handle,
            options,
            opened_at: Utc::now(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Connection string exactly as the caller supplied it
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn handle(&self) -> &Arc<dyn ServiceHandle> {
        &self.handle
    }

    /// Descriptor attributes overlaid with the caller's options
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.handle.state() == HandleState::Closed
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(connection_id = %self.id, handle_id = %self.handle.id(), "Registry connection closed");
        }
    }
}
