//! Configuration loading and merging.
//!
//! Layers, lowest precedence first:
//! 1. [`RegistryConfig::default`], with `environment` taken from `TASKER_ENV` or `APP_ENV`
//! 2. an optional configuration file (format inferred from the extension)
//! 3. `TASKER_REGISTRY__*` environment variables, e.g.
//!    `TASKER_REGISTRY__EXECUTOR__WORKER_THREADS=2`
//! 4. explicit [`ConfigOverrides`]

use super::{ConfigOverrides, RegistryConfig};
use crate::error::RegistryResult;
use config::{Config, ConfigBuilder, Environment, File};
use std::path::Path;
use tracing::{debug, info};

const ENV_PREFIX: &str = "TASKER_REGISTRY";

/// Holds the effective, validated configuration for one registry
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: RegistryConfig,
}

impl ConfigManager {
    /// Defaults, then the environment, then `overrides`
    pub fn load_with_overrides(overrides: &ConfigOverrides) -> RegistryResult<Self> {
        Self::load(None, overrides)
    }

    /// Defaults, then the file at `path`, then the environment, then `overrides`
    pub fn load_from_file<P: AsRef<Path>>(
        path: P,
        overrides: &ConfigOverrides,
    ) -> RegistryResult<Self> {
        Self::load(Some(path.as_ref()), overrides)
    }

    /// Defaults, then `TASKER_REGISTRY__SECTION__KEY` environment variables
    pub fn from_env() -> RegistryResult<Self> {
        Self::load(None, &ConfigOverrides::new())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn into_config(self) -> RegistryConfig {
        self.config
    }

    pub fn environment(&self) -> &str {
        &self.config.environment
    }

    /// Effective configuration rendered for diagnostics
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> RegistryResult<Self> {
        let mut builder = Self::base_builder()?;
        if let Some(path) = path {
            info!(path = %path.display(), "Loading registry configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );
        Self::finish(builder, overrides)
    }

    fn base_builder() -> RegistryResult<ConfigBuilder<config::builder::DefaultState>> {
        let defaults = RegistryConfig {
            environment: detect_environment(),
            ..RegistryConfig::default()
        };
        Ok(Config::builder().add_source(Config::try_from(&defaults)?))
    }

    fn finish(
        mut builder: ConfigBuilder<config::builder::DefaultState>,
        overrides: &ConfigOverrides,
    ) -> RegistryResult<Self> {
        for (key, value) in overrides.iter() {
            debug!(key = %key, value = %value, "Applying configuration override");
            builder = builder.set_override(key, value)?;
        }

        let config: RegistryConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            environment = %config.environment,
            worker_threads = config.executor.worker_threads,
            overrides = overrides.len(),
            "Registry configuration resolved"
        );
        Ok(Self { config })
    }
}

fn detect_environment() -> String {
    std::env::var("TASKER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}
