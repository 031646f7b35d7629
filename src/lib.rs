#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Connection Registry
//!
//! Connection-scoped registry of backend service handles.
//!
//! ## Overview
//!
//! Short-lived client connections each need a heavyweight backend service
//! handle that is expensive to build. The [`ServiceRegistry`] builds one handle
//! per distinct connection target on first use, hands the same instance to
//! every later caller, and tears every handle down, together with the shared
//! execution resources, when the registry itself is closed.
//!
//! ## Module Organization
//!
//! - [`registry`] - The registry core and client connections
//! - [`services`] - Service handle trait, lifecycle and the two handle variants
//! - [`target`] - Connection string parsing into cache keys
//! - [`context`] - Shared service context owned by each registry
//! - [`execution`] - Dedicated executor pool behind the shared context
//! - [`config`] - Layered configuration (defaults, file, environment, overrides)
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing subscriber bootstrap and structured log macros
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tasker_connection_registry::{ConfigOverrides, ServiceRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! tasker_connection_registry::logging::init_tracing();
//!
//! let registry = ServiceRegistry::with_overrides(
//!     ConfigOverrides::new().with("executor.worker_threads", "2"),
//! )?;
//!
//! let url = "tasker:zk1,zk2:2181;test=true";
//! if registry.accepts_target(url) {
//!     let connection = registry.connect(url, None).await?;
//!     println!("handle {} is {}", connection.handle().id(), connection.handle().state());
//! }
//!
//! registry.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod logging;
pub mod registry;
pub mod services;
pub mod target;

pub use config::{ConfigManager, ConfigOverrides, RegistryConfig};
pub use context::SharedServiceContext;
pub use error::{RegistryError, RegistryResult};
pub use registry::{RegistryConnection, RegistryStats, ServiceRegistry};
pub use services::{
    ConnectionOptions, HandleState, ServiceHandle, ServiceHandleFactory,
};
pub use target::{accepts_target, TargetDescriptor, TargetMode};
