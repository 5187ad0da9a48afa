// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use diskimage_configdrive::ConfigDriveError;
use diskimage_sys::SysError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("privilege required: run as root to write disks")]
    PrivilegeRequired,

    #[error("required tools are not installed: {}", .0.join(", "))]
    ToolsMissing(Vec<String>),

    #[error("invalid settings {path:?}: {reason}")]
    Settings { path: PathBuf, reason: String },

    #[error("invalid node inventory {path:?}: {reason}")]
    Inventory { path: PathBuf, reason: String },

    #[error("cannot parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("no node in the inventory has serial number {0}")]
    NodeNotFound(String),

    #[error("node {0:?} has no image to install")]
    NoImage(String),

    #[error("image {0:?} does not exist")]
    ImageNotFound(PathBuf),

    #[error(transparent)]
    Sys(#[from] SysError),

    #[error(transparent)]
    ConfigDrive(#[from] ConfigDriveError),
}

pub type Result<T> = std::result::Result<T, InstallError>;
