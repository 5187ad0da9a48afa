//! Block device and partition data models
//!
//! These are snapshots of what the inventory tool reported at one point in
//! time. Anything that mutates a device invalidates them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage class derived from the rotational flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskClass {
    Ssd,
    Hdd,
}

impl DiskClass {
    pub fn from_rotational(rotational: bool) -> Self {
        if rotational { Self::Hdd } else { Self::Ssd }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssd => "ssd",
            Self::Hdd => "hdd",
        }
    }
}

/// Physical disk as reported by the device-listing tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    // === Identity ===
    /// Absolute device path (e.g., "/dev/sda")
    pub name: String,

    /// Kernel name (e.g., "sda")
    pub kname: String,

    /// Disk model, whitespace trimmed
    pub model: String,

    /// Size as printed by the tool; units are tool-defined
    pub size: String,

    pub uuid: String,

    /// Host:Channel:Target:Lun address (e.g., "0:0:0:0")
    pub hctl: String,

    pub serial: String,

    /// World wide name
    pub wwn: String,

    pub vendor: String,

    // === Physical Properties ===
    pub rotational: bool,

    /// Device type ("disk", "part", "rom", ...)
    pub device_type: String,

    /// Transport (e.g., "sata", "sas", "nvme")
    pub transport: String,

    pub class: DiskClass,
}

impl BlockDevice {
    pub fn is_disk(&self) -> bool {
        self.device_type == "disk"
    }
}

/// Partition of a block device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Absolute device path (e.g., "/dev/sda1")
    pub name: String,

    pub size: String,

    /// Filesystem type, absent on a freshly created partition
    pub fs_type: Option<String>,
}

/// Partition table layout of a device
///
/// Always recomputed by probing the device; never stored alongside a
/// `BlockDevice` because creating a partition can change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionTableType {
    /// GPT (GUID Partition Table)
    Gpt,

    /// MBR/DOS (Master Boot Record)
    Mbr,

    /// No partition table signature found
    NoPartition,

    /// Layout could not be determined
    Unknown,
}

impl PartitionTableType {
    /// Classify a `PTTYPE` probe value.
    ///
    /// `None` means the probe did not report a table at all. Every value other
    /// than `gpt` is treated as an MBR flavour.
    pub fn from_pttype(value: Option<&str>) -> Self {
        match value {
            None => Self::NoPartition,
            Some("gpt") => Self::Gpt,
            Some(_) => Self::Mbr,
        }
    }
}

impl fmt::Display for PartitionTableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gpt => "GPT",
            Self::Mbr => "MBR",
            Self::NoPartition => "NoPartition",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}
