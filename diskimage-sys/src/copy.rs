// SPDX-License-Identifier: GPL-3.0-only

//! Raw block operations on devices
//!
//! Copies a payload onto a partition and reads the MBR disk signature.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::info;

use crate::cmd::CommandRunner;
use crate::error::{Result, SysError};

/// Offset of the 32-bit disk signature inside the MBR
pub const DISK_SIGNATURE_OFFSET: u64 = 440;

/// Copy `source` onto `target` block by block, synchronously.
pub fn block_copy(runner: &dyn CommandRunner, source: &Path, target: &str) -> Result<()> {
    info!("copying {} to {}", source.display(), target);
    let input = format!("if={}", source.display());
    let output = format!("of={target}");
    runner.run("dd", &[&input, &output, "bs=1M", "oflag=sync"])?;
    Ok(())
}

/// Read the little-endian disk signature of `device`.
pub fn disk_signature(device: &Path) -> Result<u32> {
    let mut file = OpenOptions::new().read(true).open(device).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SysError::DeviceNotFound(device.display().to_string())
        } else {
            SysError::Io(e)
        }
    })?;

    let mut bytes = [0u8; 4];
    file.seek(SeekFrom::Start(DISK_SIGNATURE_OFFSET))?;
    file.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}
