//! Construction of service handles.
//!
//! The registry never names a concrete handle type: it hands the target's
//! [`TargetMode`] to a [`ServiceHandleFactory`] and gets back a trait object.
//! Swapping the factory is how tests observe or fault-inject construction.

use super::{ConnectionOptions, NetworkedServiceHandle, OfflineServiceHandle, ServiceHandle};
use crate::context::SharedServiceContext;
use crate::error::RegistryResult;
use crate::target::{TargetDescriptor, TargetMode};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub trait ServiceHandleFactory: Send + Sync + fmt::Debug {
    /// Build an uninitialized handle of the variant `mode` selects
    fn create(
        &self,
        mode: TargetMode,
        context: &Arc<SharedServiceContext>,
        descriptor: &TargetDescriptor,
        options: &ConnectionOptions,
    ) -> RegistryResult<Arc<dyn ServiceHandle>>;
}

/// Offline targets get an [`OfflineServiceHandle`], everything else a
/// [`NetworkedServiceHandle`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandleFactory;

impl ServiceHandleFactory for DefaultHandleFactory {
    fn create(
        &self,
        mode: TargetMode,
        context: &Arc<SharedServiceContext>,
        descriptor: &TargetDescriptor,
        options: &ConnectionOptions,
    ) -> RegistryResult<Arc<dyn ServiceHandle>> {
        debug!(mode = %mode, descriptor = %descriptor, "Constructing service handle");
        let handle: Arc<dyn ServiceHandle> = match mode {
            TargetMode::Offline => Arc::new(OfflineServiceHandle::new(
                Arc::clone(context),
                descriptor.clone(),
                options.clone(),
            )),
            TargetMode::Networked => Arc::new(NetworkedServiceHandle::new(
                Arc::clone(context),
                descriptor.clone(),
                options.clone(),
            )),
        };
        Ok(handle)
    }
}
