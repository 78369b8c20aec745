use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Task dispatcher parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatcherConfig {
    /// Slots given to a worker registered without an explicit capacity
    #[serde(default = "default_worker_capacity")]
    pub default_worker_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_worker_capacity: default_worker_capacity(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_worker_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "default_worker_capacity must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_worker_capacity() -> usize {
    1
}
