//! # Registry Infrastructure
//!
//! The [`ServiceRegistry`] owns one service handle per distinct connection
//! target and the shared context those handles run on; [`RegistryConnection`]
//! is the lightweight per-client view over a shared handle.
//!
//! ## Architecture
//!
//! ```text
//! ServiceRegistry
//! ├── SharedServiceContext      (config + ExecutorPool, one per registry)
//! ├── ServiceHandleFactory      (TargetMode -> handle variant)
//! └── cache: TargetDescriptor -> Arc<dyn ServiceHandle>
//!
//! close(): handles ─▶ context ─▶ executor (shutdown_now) ─▶ cache cleared
//! ```

pub mod connection;
pub mod service_registry;

pub use connection::RegistryConnection;
pub use service_registry::{RegistryStats, ServiceRegistry};
