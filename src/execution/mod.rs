//! Execution resources owned by the shared service context.

pub mod executor_pool;

pub use executor_pool::ExecutorPool;
