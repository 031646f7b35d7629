//! # Backend Service Handles
//!
//! Expensive, closeable objects representing a session with a backend. The
//! registry constructs one per distinct target through a
//! [`ServiceHandleFactory`] and is the only party that closes them.
//!
//! ## Variants
//!
//! - [`OfflineServiceHandle`]: for `tasker:none` targets; no backend at all
//! - [`NetworkedServiceHandle`]: for every other target; keeps a session alive
//!   on the shared executor
//!
//! ## Lifecycle
//!
//! ```text
//! Constructed ──init──▶ Initialized ──close──▶ Closed
//!      └────────────────close──────────────────▲
//! ```

pub mod factory;
pub mod networked;
pub mod offline;
pub mod options;

pub use factory::{DefaultHandleFactory, ServiceHandleFactory};
pub use networked::{NetworkedServiceHandle, SessionSettings};
pub use offline::OfflineServiceHandle;
pub use options::ConnectionOptions;

use crate::error::{RegistryError, RegistryResult};
use crate::target::{TargetDescriptor, TargetMode};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a service handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleState {
    Constructed,
    Initialized,
    Closed,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleState::Constructed => write!(f, "constructed"),
            HandleState::Initialized => write!(f, "initialized"),
            HandleState::Closed => write!(f, "closed"),
        }
    }
}

/// Capability interface shared by every handle variant
#[async_trait]
pub trait ServiceHandle: Send + Sync + fmt::Debug {
    fn id(&self) -> Uuid;

    fn descriptor(&self) -> &TargetDescriptor;

    fn mode(&self) -> TargetMode {
        self.descriptor().mode()
    }

    fn state(&self) -> HandleState;

    fn is_closed(&self) -> bool {
        self.state() == HandleState::Closed
    }

    /// Bring the handle into service for `target`
    async fn init(&self, target: &str, options: &ConnectionOptions) -> RegistryResult<()>;

    /// Release everything the handle holds. Closing twice is a no-op.
    async fn close(&self) -> RegistryResult<()>;
}

/// Thread-safe state cell enforcing the handle lifecycle
#[derive(Debug)]
pub struct HandleLifecycle {
    state: Mutex<HandleState>,
}

impl HandleLifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HandleState::Constructed),
        }
    }

    pub fn state(&self) -> HandleState {
        *self.state.lock()
    }

    /// Fails unless the handle is still `Constructed`
    pub fn ensure_initializable(&self, target: &str) -> RegistryResult<()> {
        match self.state() {
            HandleState::Constructed => Ok(()),
            other => Err(RegistryError::handle_init(
                target,
                format!("handle is already {other}"),
            )),
        }
    }

    /// `Constructed -> Initialized`; returns `false` for any other starting state
    pub fn mark_initialized(&self) -> bool {
        let mut state = self.state.lock();
        if *state == HandleState::Constructed {
            *state = HandleState::Initialized;
            true
        } else {
            false
        }
    }

    /// Move to `Closed`; returns `false` if it already was
    pub fn mark_closed(&self) -> bool {
        let mut state = self.state.lock();
        if *state == HandleState::Closed {
            false
        } else {
            *state = HandleState::Closed;
            true
        }
    }
}

impl Default for HandleLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
