use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use super::validate_directory;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log files output directory
    ///
    /// Default: `./logs`
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            level: default_level(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        validate_directory(&self.log_dir, "log_dir")?;
        if self.level.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "logging level cannot be empty".into(),
            )));
        }
        Ok(())
    }

    /// Filter for one output layer: `RUST_LOG` when set and parsable,
    /// `level` otherwise.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
fn default_level() -> String {
    "info".into()
}
