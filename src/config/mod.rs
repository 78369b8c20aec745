//! Settings for the coordination engine.
//!
//! Provides hierarchical settings loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod configuration;
mod dispatcher;
mod logging;
pub use configuration::*;
pub use dispatcher::*;
pub use logging::*;

use std::env;
use std::fmt::Debug;
use std::path::Path;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Prefix of the environment variables overriding settings, e.g.
/// `DCOORD__DISPATCHER__DEFAULT_WORKER_CAPACITY=4`
pub const ENV_PREFIX: &str = "DCOORD";

/// Main settings container
///
/// Combines all subsystem settings with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Settings file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Layered configuration store settings
    #[serde(default)]
    pub configuration: ConfigurationSettings,
    /// Task dispatcher parameters
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Debug for Settings {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("configuration", &self.configuration)
            .finish()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

impl Settings {
    /// Loads settings from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Settings file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `DCOORD__` prefix (highest priority)
    ///
    /// # Examples
    /// ```ignore
    /// let settings = Settings::new()?
    ///     .with_override_config("custom.toml")?
    ///     .validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Applies additional overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current values
    /// 2. New settings file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Validates every subsystem and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.configuration.validate()?;
        self.dispatcher.validate()?;
        self.logging.validate()?;
        Ok(self)
    }
}

/// Ensures a directory path setting is not empty
pub(super) fn validate_directory(
    path: &Path,
    name: &str,
) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Config(ConfigError::Message(format!(
            "{name} path cannot be empty"
        ))));
    }
    Ok(())
}
