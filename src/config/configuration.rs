use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::validate_directory;
use crate::Error;
use crate::Result;

/// Settings of the layered configuration store
///
/// Field-level defaults use helper functions prefixed with `default_`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfigurationSettings {
    /// Section holding the store's own options (`Version`, `Servers`, `Name`...)
    ///
    /// Default: `/DIRAC/Configuration`
    #[serde(default = "default_configuration_path")]
    pub configuration_path: String,

    /// Operator provided tree loaded into the local layer at start
    ///
    /// Default: `etc/dirac.cfg`
    #[serde(default = "default_local_file")]
    pub local_file: PathBuf,

    /// Directory receiving `<name>.cfg` when the remote layer is written to disk
    ///
    /// Default: `etc`
    #[serde(default = "default_etc_dir")]
    pub etc_dir: PathBuf,

    /// Root of the zip backups, bucketed by `YYYY/MM`
    ///
    /// Default: `etc/csbackup`
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Reload cadence used while the tree carries no `RefreshTime`
    #[serde(default = "default_refresh_poll_in_ms")]
    pub refresh_poll_in_ms: u64,
}

impl Default for ConfigurationSettings {
    fn default() -> Self {
        Self {
            configuration_path: default_configuration_path(),
            local_file: default_local_file(),
            etc_dir: default_etc_dir(),
            backup_dir: default_backup_dir(),
            refresh_poll_in_ms: default_refresh_poll_in_ms(),
        }
    }
}

impl ConfigurationSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.configuration_path.starts_with('/') || self.configuration_path.trim_matches('/').is_empty() {
            return Err(Error::Config(ConfigError::Message(format!(
                "configuration_path must be an absolute section path, got {:?}",
                self.configuration_path
            ))));
        }
        if self.refresh_poll_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "refresh_poll_in_ms cannot be 0".into(),
            )));
        }
        validate_directory(&self.etc_dir, "etc_dir")?;
        validate_directory(&self.backup_dir, "backup_dir")?;
        Ok(())
    }

    pub fn refresh_poll(&self) -> Duration {
        Duration::from_millis(self.refresh_poll_in_ms)
    }

    /// Absolute path of option `name` inside the store's own section
    pub(crate) fn option_path(
        &self,
        name: &str,
    ) -> String {
        format!("{}/{}", self.configuration_path.trim_end_matches('/'), name)
    }
}

fn default_configuration_path() -> String {
    "/DIRAC/Configuration".into()
}
fn default_local_file() -> PathBuf {
    PathBuf::from("etc/dirac.cfg")
}
fn default_etc_dir() -> PathBuf {
    PathBuf::from("etc")
}
fn default_backup_dir() -> PathBuf {
    PathBuf::from("etc/csbackup")
}
// in ms
fn default_refresh_poll_in_ms() -> u64 {
    300_000
}
