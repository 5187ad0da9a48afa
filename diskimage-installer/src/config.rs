// SPDX-License-Identifier: GPL-3.0-only

//! Installer settings
//!
//! Read from the TOML file given with `--config`. Every key is optional.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use diskimage_sys::{DEFAULT_CONFIG_DRIVE_MIB, MAX_MBR_DISK_SIZE_MIB, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::error::{InstallError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Size of the config-drive partition, and the largest payload accepted
    pub max_config_drive_mib: u64,

    /// Partition table rescan attempts, including the first
    pub rescan_attempts: u32,

    pub rescan_initial_delay_ms: u64,

    /// Where the config-drive image and its staging tree are created
    pub work_dir: PathBuf,

    /// Also log to a daily file in this directory
    pub log_dir: Option<PathBuf>,

    pub sysfs_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_config_drive_mib: DEFAULT_CONFIG_DRIVE_MIB,
            rescan_attempts: 5,
            rescan_initial_delay_ms: 1000,
            work_dir: PathBuf::from("/tmp"),
            log_dir: None,
            sysfs_root: PathBuf::from("/sys"),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let invalid = |reason: String| InstallError::Settings {
            path: path.to_path_buf(),
            reason,
        };

        let raw = fs::read_to_string(path).map_err(|error| invalid(error.to_string()))?;
        let settings: Settings = toml::from_str(&raw).map_err(|error| invalid(error.to_string()))?;
        settings.validate().map_err(invalid)?;
        Ok(settings)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_config_drive_mib == 0 {
            return Err("max_config_drive_mib must be positive".to_string());
        }
        if self.max_config_drive_mib >= MAX_MBR_DISK_SIZE_MIB {
            return Err(format!(
                "max_config_drive_mib must be below {MAX_MBR_DISK_SIZE_MIB}"
            ));
        }
        if self.rescan_attempts == 0 {
            return Err("rescan_attempts must be at least 1".to_string());
        }
        if self.work_dir.as_os_str().is_empty() {
            return Err("work_dir must not be empty".to_string());
        }
        Ok(())
    }

    pub fn rescan_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.rescan_attempts,
            Duration::from_millis(self.rescan_initial_delay_ms),
        )
    }
}
