// SPDX-License-Identifier: GPL-3.0-only

//! Config-drive packaging
//!
//! The payload is an ISO 9660 image labelled `config-2` holding the OpenStack
//! metadata tree that cloud-init looks for:
//!
//! ```text
//! openstack/content/
//! openstack/<version>/meta_data.json
//! openstack/<version>/network_data.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use diskimage_sys::CommandRunner;
use diskimage_types::{MetaData, NetworkMetadata, Node};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ConfigDriveError, Result};

/// Volume label cloud-init probes for
pub const VOLUME_LABEL: &str = "config-2";

/// Metadata versions written into the tree
pub const METADATA_VERSIONS: [&str; 3] = ["2012-08-10", "2015-10-15", "latest"];

const MIB: u64 = 1024 * 1024;

/// Instance metadata for `node` with a freshly generated instance uuid.
pub fn metadata_for(node: &Node) -> MetaData {
    MetaData {
        availability_zone: node.availability_zone.clone(),
        files: Vec::new(),
        hostname: node.name.clone(),
        name: node.name.clone(),
        meta: node.meta.clone(),
        public_keys: node.public_keys.clone(),
        uuid: Uuid::new_v4().to_string(),
    }
}

fn to_json<T: serde::Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|source| ConfigDriveError::Serialize { what, source })
}

/// Lay out the metadata tree under `root`.
pub fn write_tree(root: &Path, metadata: &MetaData, network: &NetworkMetadata) -> Result<()> {
    let meta_data = to_json("meta_data.json", metadata)?;
    let network_data = to_json("network_data.json", network)?;

    let openstack = root.join("openstack");
    fs::create_dir_all(openstack.join("content"))?;
    for version in METADATA_VERSIONS {
        let dir = openstack.join(version);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("meta_data.json"), &meta_data)?;
        fs::write(dir.join("network_data.json"), &network_data)?;
    }
    Ok(())
}

/// Packages metadata into config-drive images
pub struct ConfigDriveBuilder {
    runner: Arc<dyn CommandRunner>,
    work_dir: PathBuf,
}

impl ConfigDriveBuilder {
    pub fn new(runner: Arc<dyn CommandRunner>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            work_dir: work_dir.into(),
        }
    }

    /// Build the ISO in the work directory.
    ///
    /// The staging tree is removed before returning, whether or not the
    /// build succeeded.
    pub fn build(&self, metadata: &MetaData, network: &NetworkMetadata) -> Result<ConfigDrive> {
        let staging = tempfile::Builder::new()
            .prefix("configdrive-")
            .tempdir_in(&self.work_dir)?;
        write_tree(staging.path(), metadata, network)?;
        debug!("staged config drive tree in {}", staging.path().display());

        let iso = tempfile::Builder::new()
            .prefix(&format!("configdrive-{}-", metadata.uuid))
            .suffix(".iso")
            .tempfile_in(&self.work_dir)?
            .into_temp_path();

        let iso_arg = iso.to_string_lossy();
        let tree_arg = staging.path().to_string_lossy();
        self.runner.run(
            "mkisofs",
            &["-R", "-V", VOLUME_LABEL, "-o", &iso_arg, &tree_arg],
        )?;

        let drive = ConfigDrive::from_temp_path(iso);
        info!(
            "config drive written to {} ({} bytes)",
            drive.path().display(),
            drive.size()?
        );
        Ok(drive)
    }
}

/// A config-drive image on disk, deleted when dropped
#[derive(Debug)]
pub struct ConfigDrive {
    path: TempPath,
}

impl ConfigDrive {
    fn from_temp_path(path: TempPath) -> Self {
        Self { path }
    }

    /// Take ownership of an already packaged image.
    pub fn from_file(file: NamedTempFile) -> Self {
        Self::from_temp_path(file.into_temp_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Image size in bytes
    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Fail when the image does not fit a partition of `max_mib`.
    pub fn ensure_fits(&self, max_mib: u64) -> Result<()> {
        let size = self.size()?;
        if size > max_mib.saturating_mul(MIB) {
            return Err(ConfigDriveError::Oversize {
                path: self.path().to_path_buf(),
                size,
                max_mib,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use diskimage_sys::testing::ScriptedRunner;
    use diskimage_types::{Link, Network, NetworkType, Route};

    use super::*;

    fn node() -> Node {
        Node {
            name: "compute-07".to_string(),
            serial_number: "CZ21150HJK".to_string(),
            availability_zone: "rack-3".to_string(),
            public_keys: BTreeMap::from([(
                "ops".to_string(),
                "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGq ops@bastion".to_string(),
            )]),
            ..Default::default()
        }
    }

    fn network() -> NetworkMetadata {
        NetworkMetadata {
            links: vec![Link {
                id: "3c:ec:ef:10:20:30".to_string(),
                mac_address: Some("3c:ec:ef:10:20:30".to_string()),
                ..Default::default()
            }],
            networks: vec![Network {
                id: "ipv4-3c:ec:ef:10:20:30".to_string(),
                link: "3c:ec:ef:10:20:30".to_string(),
                network_type: NetworkType::Static,
                ip_address: "10.20.0.15".to_string(),
                netmask: "255.255.255.0".to_string(),
                routes: vec![Route::default_via("10.20.0.1")],
            }],
            services: Vec::new(),
        }
    }

    #[test]
    fn metadata_names_the_node() {
        let first = metadata_for(&node());
        let second = metadata_for(&node());

        assert_eq!(first.hostname, "compute-07");
        assert_eq!(first.name, "compute-07");
        assert_eq!(first.availability_zone, "rack-3");
        assert!(first.public_keys.contains_key("ops"));
        assert!(Uuid::parse_str(&first.uuid).is_ok());
        assert_ne!(first.uuid, second.uuid);
    }

    #[test]
    fn tree_holds_every_version() {
        let root = tempfile::tempdir().unwrap();
        let metadata = metadata_for(&node());
        write_tree(root.path(), &metadata, &network()).unwrap();

        assert!(root.path().join("openstack/content").is_dir());
        for version in METADATA_VERSIONS {
            let dir = root.path().join("openstack").join(version);
            let meta: MetaData =
                serde_json::from_slice(&fs::read(dir.join("meta_data.json")).unwrap()).unwrap();
            assert_eq!(meta, metadata);

            let net: NetworkMetadata =
                serde_json::from_slice(&fs::read(dir.join("network_data.json")).unwrap())
                    .unwrap();
            assert_eq!(net, network());
        }
    }

    #[test]
    fn builds_iso_and_removes_staging_tree() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let builder = ConfigDriveBuilder::new(runner.clone(), work.path());

        let drive = builder.build(&metadata_for(&node()), &network()).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let args: Vec<&str> = calls[0].split(' ').collect();
        assert_eq!(&args[..5], ["mkisofs", "-R", "-V", "config-2", "-o"]);
        assert_eq!(Path::new(args[5]), drive.path());
        assert!(!Path::new(args[6]).exists());

        let iso = drive.path().to_path_buf();
        assert!(iso.exists());
        assert!(iso.starts_with(work.path()));
        drop(drive);
        assert!(!iso.exists());
    }

    #[test]
    fn packaging_failure_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail("mkisofs", 255, "mkisofs: No space left on device");
        let builder = ConfigDriveBuilder::new(runner, work.path());

        let error = builder.build(&metadata_for(&node()), &network()).unwrap_err();
        assert!(error.to_string().contains("No space left on device"));
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_work_dir_is_an_io_error() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let builder = ConfigDriveBuilder::new(runner, work.path().join("gone"));
        assert!(matches!(
            builder.build(&metadata_for(&node()), &network()),
            Err(ConfigDriveError::Io(_))
        ));
    }

    #[test]
    fn oversize_images_are_rejected() {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(64 * MIB + 1).unwrap();
        let drive = ConfigDrive::from_file(file);

        let error = drive.ensure_fits(64).unwrap_err();
        assert!(matches!(error, ConfigDriveError::Oversize { max_mib: 64, .. }));
        assert!(drive.ensure_fits(65).is_ok());
    }

    #[test]
    fn exact_fit_is_accepted() {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(64 * MIB).unwrap();
        assert!(ConfigDrive::from_file(file).ensure_fits(64).is_ok());
    }
}
