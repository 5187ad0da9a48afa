// SPDX-License-Identifier: GPL-3.0-only

//! Partition table engine
//!
//! Detects the layout of a device, repairs misplaced GPT backup structures and
//! appends the fixed-size auxiliary partition under either GPT or MBR.
//! Every step re-probes the device instead of trusting an earlier answer,
//! because the kernel's view of a device changes asynchronously after writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use diskimage_types::PartitionTableType;
use tracing::{debug, info};

use crate::cmd::CommandRunner;
use crate::error::{Result, SysError};
use crate::retry::RetryPolicy;

/// Size of the auxiliary (config-drive) partition in MiB
pub const DEFAULT_CONFIG_DRIVE_MIB: u64 = 64;

/// Largest disk an MBR table can address: 2 TiB, in MiB
pub const MAX_MBR_DISK_SIZE_MIB: u64 = 2_097_152;

/// `sgdisk -v` diagnostic for a backup GPT header that is not at the disk end
const GPT_BACKUP_MISPLACED: &str = "it doesn't reside\nat the end of the disk";

const MIB: u64 = 1024 * 1024;

/// `sgdisk -n` argument for a partition of `size_mib` at the end of the disk.
///
/// `0` selects the next free partition number and the default end sector.
pub fn gpt_create_option(size_mib: u64) -> String {
    format!("0:-{size_mib}MB:0")
}

/// `parted mkpart` start and end for a partition of `size_mib`.
///
/// Past the MBR ceiling the end of the disk cannot be addressed, so the
/// partition is placed just below the ceiling instead.
pub fn mbr_range(disk_mib: u64, size_mib: u64) -> Result<(String, String)> {
    let start = MAX_MBR_DISK_SIZE_MIB
        .checked_sub(size_mib)
        .and_then(|start| start.checked_sub(1))
        .ok_or(SysError::PartitionTooLarge {
            size_mib,
            max_mib: MAX_MBR_DISK_SIZE_MIB - 1,
        })?;

    if disk_mib >= MAX_MBR_DISK_SIZE_MIB {
        Ok((
            format!("{start}MiB"),
            format!("{}MiB", MAX_MBR_DISK_SIZE_MIB - 1),
        ))
    } else {
        Ok((format!("-{size_mib}MiB"), "-0".to_string()))
    }
}

/// Parse the `KEY=value` tags `blkid --probe` prints after `<device>: `.
///
/// Values may be double-quoted, in which case they can contain spaces.
pub fn parse_probe_tags(output: &str) -> Result<BTreeMap<String, String>> {
    let line = output.trim();
    let mut rest = line
        .split_once(": ")
        .map(|(_, tags)| tags)
        .unwrap_or(line)
        .trim_start();

    let mut tags = BTreeMap::new();
    while !rest.is_empty() {
        let (key, after) = rest
            .split_once('=')
            .ok_or_else(|| SysError::parse("blkid output", format!("tag without '=': {rest}")))?;
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(SysError::parse(
                "blkid output",
                format!("tag without '=': {key}"),
            ));
        }

        let (value, remainder) = match after.strip_prefix('"') {
            Some(quoted) => {
                let end = quoted.find('"').ok_or_else(|| {
                    SysError::parse("blkid output", format!("unterminated value for {key}"))
                })?;
                (&quoted[..end], &quoted[end + 1..])
            }
            None => {
                let end = after.find(char::is_whitespace).unwrap_or(after.len());
                after.split_at(end)
            }
        };

        tags.insert(key.to_string(), value.to_string());
        rest = remainder.trim_start();
    }

    Ok(tags)
}

/// Wait for queued udev events to be processed.
pub fn udev_settle(runner: &dyn CommandRunner) -> Result<()> {
    runner.run("udevadm", &["settle"])?;
    Ok(())
}

pub struct PartitionTable {
    runner: Arc<dyn CommandRunner>,
    partition_mib: u64,
    rescan: RetryPolicy,
}

impl PartitionTable {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            partition_mib: DEFAULT_CONFIG_DRIVE_MIB,
            rescan: RetryPolicy::default(),
        }
    }

    /// Size of the partition `create_partition` adds
    pub fn with_partition_size(mut self, size_mib: u64) -> Self {
        self.partition_mib = size_mib;
        self
    }

    pub fn with_rescan_policy(mut self, policy: RetryPolicy) -> Self {
        self.rescan = policy;
        self
    }

    pub fn partition_mib(&self) -> u64 {
        self.partition_mib
    }

    /// Probe the current partition table layout of `device`.
    pub fn detect(&self, device: &str) -> Result<PartitionTableType> {
        self.partprobe(device)?;

        let output = self.runner.output("blkid", &[device, "--probe"])?;
        // blkid exits 2 without output when it cannot identify anything.
        if output.code == Some(2) && output.combined().trim().is_empty() {
            debug!("blkid found no signature on {}", device);
            return Ok(PartitionTableType::NoPartition);
        }
        let output = output.check()?;

        let tags = parse_probe_tags(&output.stdout)?;
        let layout = PartitionTableType::from_pttype(tags.get("PTTYPE").map(String::as_str));
        info!("{} has partition table {}", device, layout);
        Ok(layout)
    }

    /// Move misplaced GPT backup structures to the end of `device`.
    ///
    /// Returns whether a relocation was performed. Non-GPT devices are left
    /// untouched.
    pub fn repair(&self, device: &str) -> Result<bool> {
        let layout = self.detect(device)?;
        if layout != PartitionTableType::Gpt {
            debug!("{} is {}, no GPT repair needed", device, layout);
            return Ok(false);
        }

        let report = self.verify(device)?;
        if !report.contains(GPT_BACKUP_MISPLACED) {
            debug!("backup GPT structures of {} are in place", device);
            return Ok(false);
        }

        info!("relocating backup GPT structures to the end of {}", device);
        self.runner.run("sgdisk", &["-e", device])?;
        Ok(true)
    }

    /// Append the auxiliary partition to `device` using `layout`.
    pub fn create_partition(&self, device: &str, layout: PartitionTableType) -> Result<()> {
        match layout {
            PartitionTableType::Gpt => {
                let option = gpt_create_option(self.partition_mib);
                info!("creating GPT partition {} on {}", option, device);
                self.runner.run("sgdisk", &["-n", &option, device])?;
            }
            PartitionTableType::Mbr => {
                let disk_mib = self.disk_size_mib(device)?;
                let (start, end) = mbr_range(disk_mib, self.partition_mib)?;
                info!(
                    "creating MBR partition {}..{} on {} ({} MiB disk)",
                    start, end, device, disk_mib
                );
                self.runner.run(
                    "parted",
                    &[
                        "-a", "optimal", "-s", "--", device, "mkpart", "primary", "fat32", &start,
                        &end,
                    ],
                )?;
            }
            PartitionTableType::NoPartition | PartitionTableType::Unknown => {
                return Err(SysError::UnsupportedLayout {
                    device: device.to_string(),
                    layout,
                });
            }
        }

        self.rescan(device)
    }

    /// Flush writes and make the kernel re-read the partition table.
    pub fn rescan(&self, device: &str) -> Result<()> {
        self.runner.run("sync", &[])?;
        udev_settle(self.runner.as_ref())?;
        self.partprobe(device)?;
        self.verify(device)?;
        Ok(())
    }

    /// Disk capacity in whole MiB
    pub fn disk_size_mib(&self, device: &str) -> Result<u64> {
        let output = self.runner.run("blockdev", &["--getsize64", device])?;
        let bytes: u64 = output
            .stdout
            .trim()
            .parse()
            .map_err(|e| SysError::parse(format!("size of {device}"), e))?;
        Ok(bytes / MIB)
    }

    fn partprobe(&self, device: &str) -> Result<()> {
        self.rescan.run(|| self.runner.run("partprobe", &[device]).map(|_| ()))
    }

    fn verify(&self, device: &str) -> Result<String> {
        Ok(self.runner.run("sgdisk", &["-v", device])?.combined())
    }
}
