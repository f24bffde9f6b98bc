//! Configuration Loader
//!
//! Layers the built-in defaults, an optional configuration file (TOML, YAML or
//! JSON, detected from the extension) and `CONFCTL__*` environment overrides.

use super::error::{ConfigResult, ConfigurationError};
use super::ControllerConfig;
use crate::constants::{CONFIG_ENV_PREFIX, CONFIG_ENV_SEPARATOR};
use crate::logging::get_environment;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded and validated controller configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: ControllerConfig,
    environment: String,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load defaults and environment overrides only
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_sources(None, None)
    }

    /// Load a configuration file on top of the defaults
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        Self::load_sources(Some(path), None)
    }

    /// Wrap an already assembled configuration after validating it
    pub fn from_config(config: ControllerConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: get_environment(),
            config_path: None,
        }))
    }

    /// Load with an explicit set of environment variables instead of the
    /// process environment.
    /// This is useful for testing without modifying global environment variables
    pub fn load_with_overrides(
        path: Option<&Path>,
        variables: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_sources(path, Some(variables))
    }

    fn load_sources(
        path: Option<&Path>,
        variables: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let environment = get_environment();
        debug!(
            environment = %environment,
            config_path = ?path,
            "Loading controller configuration"
        );

        let mut builder =
            Config::builder().add_source(Config::try_from(&ControllerConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .separator(CONFIG_ENV_SEPARATOR)
                .try_parsing(true)
                .source(variables),
        );

        let config: ControllerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            environment = %environment,
            enabled = config.executor.enabled,
            period_ms = config.executor.period_ms,
            max_attempt_count = config.executor.max_attempt_count,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_path: path.map(Path::to_path_buf),
        }))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// File the configuration was read from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
