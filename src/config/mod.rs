//! # Registry Configuration
//!
//! Layered configuration for the connection registry and the shared service
//! context it owns. Defaults come from [`RegistryConfig::default`]; an optional
//! file layer, `TASKER_REGISTRY__*` environment variables and caller-supplied
//! [`ConfigOverrides`] are merged on top by the [`ConfigManager`].
//!
//! ## Usage
//!
//! ```rust
//! use tasker_connection_registry::config::{ConfigManager, ConfigOverrides};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let overrides = ConfigOverrides::new().with("executor.worker_threads", "2");
//! let manager = ConfigManager::load_with_overrides(&overrides)?;
//! assert_eq!(manager.config().executor.worker_threads, 2);
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub use loader::ConfigManager;

/// Root configuration for a registry instance
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Deployment environment (development/test/production)
    pub environment: String,

    /// Execution resources shared by every handle
    pub executor: ExecutorConfig,

    /// Session defaults applied to networked handles
    pub handles: HandleConfig,
}

/// Worker pool sizing for the shared execution resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutorConfig {
    pub worker_threads: usize,
    pub thread_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HandleConfig {
    pub connect_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            executor: ExecutorConfig::default(),
            handles: HandleConfig::default(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            thread_name: "tasker-registry-worker".to_string(),
        }
    }
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            keepalive_interval_ms: 30_000,
        }
    }
}

impl RegistryConfig {
    /// Reject configurations the shared context cannot be built from
    pub fn validate(&self) -> RegistryResult<()> {
        if self.executor.worker_threads == 0 {
            return Err(RegistryError::Configuration(
                "executor.worker_threads must be at least 1".to_string(),
            ));
        }
        if self.executor.thread_name.trim().is_empty() {
            return Err(RegistryError::Configuration(
                "executor.thread_name must not be empty".to_string(),
            ));
        }
        if self.handles.keepalive_interval_ms == 0 {
            return Err(RegistryError::Configuration(
                "handles.keepalive_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.handles.connect_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.handles.keepalive_interval_ms)
    }
}

/// Read-only set of dotted-key overrides applied on top of the defaults.
///
/// Values are strings; the configuration layer converts them to the target
/// field type during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    values: BTreeMap<String, String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of these overrides with `key` set to `value`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigOverrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.executor.worker_threads, 4);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.keepalive_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = RegistryConfig::default();
        config.executor.worker_threads = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RegistryError::Configuration(_)));
    }

    #[test]
    fn test_overrides_are_immutable_builders() {
        let base = ConfigOverrides::new();
        let extended = base.clone().with("executor.worker_threads", "8");

        assert!(base.is_empty());
        assert_eq!(extended.len(), 1);
        assert_eq!(extended.get("executor.worker_threads"), Some("8"));
    }

    #[test]
    fn test_overrides_from_iterator() {
        let overrides: ConfigOverrides = [("a.b", "1"), ("c", "two")].into_iter().collect();
        let pairs: Vec<_> = overrides.iter().collect();
        assert_eq!(pairs, vec![("a.b", "1"), ("c", "two")]);
    }
}
