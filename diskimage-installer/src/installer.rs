// SPDX-License-Identifier: GPL-3.0-only

//! Provisioning run
//!
//! Sequences one install: build the config drive, pick the root disk, write
//! the image, append the config-drive partition and copy the payload onto it.
//! Nothing is rolled back on failure; the disk is left as the last
//! successful step produced it.

use std::path::Path;
use std::sync::Arc;

use diskimage_configdrive::{ConfigDrive, ConfigDriveBuilder, metadata_for, synthesize};
use diskimage_sys::{
    CommandRunner, Inventory, NetDiscovery, PartitionTable, block_copy, created_partition,
    disk_signature, match_device,
};
use diskimage_types::{BlockDevice, Node, Partition, PartitionTableType};
use tracing::{debug, info, info_span};

use crate::config::Settings;
use crate::error::{InstallError, Result};
use crate::image::write_image;

pub struct Installer {
    node: Node,
    runner: Arc<dyn CommandRunner>,
    settings: Settings,
}

impl Installer {
    pub fn new(node: Node, runner: Arc<dyn CommandRunner>, settings: Settings) -> Self {
        Self {
            node,
            runner,
            settings,
        }
    }

    fn partition_table(&self) -> PartitionTable {
        PartitionTable::new(self.runner.clone())
            .with_partition_size(self.settings.max_config_drive_mib)
            .with_rescan_policy(self.settings.rescan_policy())
    }

    fn inventory(&self) -> Inventory {
        Inventory::new(self.runner.clone())
    }

    pub fn install_os(&self) -> Result<()> {
        let span = info_span!("install", node = %self.node.name);
        let _enter = span.enter();

        let image = self
            .node
            .image_info
            .as_ref()
            .map(|info| info.image.as_str())
            .filter(|image| !image.is_empty())
            .ok_or_else(|| InstallError::NoImage(self.node.name.clone()))?;

        let config_drive = self.generate_config_drive()?;
        self.configure_raid();

        let root = self.install_device()?;
        write_image(self.runner.as_ref(), Path::new(image), &root.name)?;

        if let Some(drive) = &config_drive {
            self.create_config_drive_partition(drive, &root)?;
        }

        let signature = disk_signature(Path::new(&root.name))?;
        info!("disk signature of {}: 0x{:08x}", root.name, signature);
        Ok(())
    }

    /// Build the config drive, or `None` when the node has no network config.
    pub fn generate_config_drive(&self) -> Result<Option<ConfigDrive>> {
        if self.node.network.is_empty() {
            info!("no network configuration, skipping config drive");
            return Ok(None);
        }

        let interfaces =
            NetDiscovery::new(self.runner.clone(), &self.settings.sysfs_root).interfaces()?;
        let network = synthesize(&interfaces, &self.node.network)?;
        let metadata = metadata_for(&self.node);

        let drive = ConfigDriveBuilder::new(self.runner.clone(), &self.settings.work_dir)
            .build(&metadata, &network)?;
        drive.ensure_fits(self.settings.max_config_drive_mib)?;
        Ok(Some(drive))
    }

    fn configure_raid(&self) {
        if let Some(raid) = &self.node.raid_config {
            info!(
                "RAID config with {} logical disk(s) requested, controller left as is",
                raid.logical_disks.len()
            );
        }
    }

    /// Disk selected by the node's root-device hints.
    pub fn install_device(&self) -> Result<BlockDevice> {
        let disks = self.inventory().list_disks()?;
        Ok(match_device(&disks, &self.node.root_device)?)
    }

    /// Append the config-drive partition to `device` and copy `drive` onto it.
    pub fn create_config_drive_partition(
        &self,
        drive: &ConfigDrive,
        device: &BlockDevice,
    ) -> Result<Partition> {
        drive.ensure_fits(self.settings.max_config_drive_mib)?;

        let table = self.partition_table();
        let inventory = self.inventory();

        table.rescan(&device.name)?;
        let before = inventory.list_partitions(device)?;

        info!("adding config drive partition to {}", device.name);
        let layout = table.detect(&device.name)?;
        if layout == PartitionTableType::Gpt && table.repair(&device.name)? {
            debug!("backup GPT of {} relocated", device.name);
        }
        table.create_partition(&device.name, layout)?;

        let after = inventory.list_partitions(device)?;
        let partition = created_partition(&device.name, &before, &after)?;

        info!("writing config drive to partition {}", partition.name);
        block_copy(self.runner.as_ref(), drive.path(), &partition.name)?;
        Ok(partition)
    }
}
