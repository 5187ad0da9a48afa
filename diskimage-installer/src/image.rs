// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use diskimage_sys::CommandRunner;
use tracing::info;

use crate::error::{InstallError, Result};

/// Write `image` onto `device`, converting it to raw on the fly.
///
/// Existing filesystem and partition-table signatures are wiped first so that
/// stale metadata beyond the end of the new image cannot be picked up.
pub fn write_image(runner: &dyn CommandRunner, image: &Path, device: &str) -> Result<()> {
    if !image.is_file() {
        return Err(InstallError::ImageNotFound(image.to_path_buf()));
    }

    info!("writing image {} to {}", image.display(), device);
    let image_arg = image.to_string_lossy();
    runner.run("wipefs", &["-a", device])?;
    runner.run("qemu-img", &["convert", "-O", "raw", &image_arg, device])?;
    runner.run("sync", &[])?;
    info!("image written to {}", device);
    Ok(())
}
