//! Error types for the connection registry.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("Registry closed: {0}")]
    Closed(String),
    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
    #[error("Handle initialization failed for '{target}': {reason}")]
    HandleInit { target: String, reason: String },
    #[error("Teardown failed ({} failure(s)): {}", .failures.len(), .failures.join("; "))]
    Teardown { failures: Vec<String> },
    #[error("Backend service error: {0}")]
    Backend(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Executor error: {0}")]
    Executor(String),
}

impl RegistryError {
    pub fn invalid_target(target: &str, reason: impl Into<String>) -> Self {
        RegistryError::InvalidTarget {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    pub fn handle_init(target: &str, reason: impl Into<String>) -> Self {
        RegistryError::HandleInit {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the same operation on the same registry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RegistryError::InvalidTarget { .. }
                | RegistryError::HandleInit { .. }
                | RegistryError::Backend(_)
        )
    }
}

impl From<config::ConfigError> for RegistryError {
    fn from(error: config::ConfigError) -> Self {
        RegistryError::Configuration(error.to_string())
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(error: std::io::Error) -> Self {
        RegistryError::Executor(error.to_string())
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
