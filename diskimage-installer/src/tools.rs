// SPDX-License-Identifier: GPL-3.0-only

use which::which;

use crate::error::{InstallError, Result};

/// Host tools every install needs
pub const REQUIRED_TOOLS: &[&str] = &[
    "udevadm",
    "lsblk",
    "partprobe",
    "blkid",
    "sgdisk",
    "parted",
    "blockdev",
    "mkisofs",
    "wipefs",
    "qemu-img",
    "dd",
    "sync",
];

/// Tools for a run; selecting the node from an inventory also needs `lshw`.
pub fn required_tools(from_inventory: bool) -> Vec<&'static str> {
    let mut tools = REQUIRED_TOOLS.to_vec();
    if from_inventory {
        tools.push("lshw");
    }
    tools
}

pub fn missing_tools<'a>(tools: &[&'a str]) -> Vec<&'a str> {
    tools
        .iter()
        .copied()
        .filter(|tool| which(tool).is_err())
        .collect()
}

/// Fail fast, before any disk is touched, when a tool is not on `PATH`.
pub fn ensure_installed(tools: &[&str]) -> Result<()> {
    let missing = missing_tools(tools);
    if missing.is_empty() {
        return Ok(());
    }
    Err(InstallError::ToolsMissing(
        missing.into_iter().map(str::to_string).collect(),
    ))
}
