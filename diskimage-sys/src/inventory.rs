// SPDX-License-Identifier: GPL-3.0-only

//! Block device and partition inventory
//!
//! Both listings re-run `lsblk -O -J`; nothing is cached because every write
//! to a disk can change what the kernel reports.

use std::sync::Arc;

use diskimage_types::{BlockDevice, DiskClass, Partition, RootDeviceHints};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cmd::CommandRunner;
use crate::error::{Result, SysError};
use crate::table::udev_settle;

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

/// One `lsblk` record
///
/// util-linux changed several columns from strings to JSON booleans and
/// numbers over time; both dialects are accepted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LsblkDevice {
    #[serde(deserialize_with = "text")]
    name: String,
    #[serde(deserialize_with = "text")]
    kname: String,
    #[serde(deserialize_with = "text")]
    model: String,
    #[serde(deserialize_with = "text")]
    size: String,
    #[serde(deserialize_with = "text")]
    uuid: String,
    #[serde(deserialize_with = "text")]
    hctl: String,
    #[serde(deserialize_with = "text")]
    serial: String,
    #[serde(deserialize_with = "text")]
    wwn: String,
    #[serde(deserialize_with = "text")]
    vendor: String,
    #[serde(deserialize_with = "flag", default = "assume_rotational")]
    rota: bool,
    #[serde(rename = "type", deserialize_with = "text")]
    device_type: String,
    #[serde(deserialize_with = "text")]
    tran: String,
    fstype: Option<String>,
    children: Vec<LsblkDevice>,
}

fn assume_rotational() -> bool {
    true
}

/// String column that may also arrive as a number, a boolean or null.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(de::Error::custom(format!("expected a scalar, found {other}"))),
    }
}

/// Boolean column; anything other than an explicit zero counts as set.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::String(s)) => Ok(s.trim() != "0"),
        Some(Value::Number(n)) => Ok(n.as_u64() != Some(0)),
        None | Some(Value::Null) => Ok(true),
        Some(other) => Err(de::Error::custom(format!("expected a flag, found {other}"))),
    }
}

fn device_path(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/dev/{name}")
    }
}

fn parse_lsblk(json: &str) -> Result<Vec<LsblkDevice>> {
    let output: LsblkOutput =
        serde_json::from_str(json).map_err(|e| SysError::parse("lsblk output", e))?;
    Ok(output.blockdevices)
}

impl From<LsblkDevice> for BlockDevice {
    fn from(raw: LsblkDevice) -> Self {
        Self {
            name: device_path(&raw.name),
            kname: raw.kname,
            model: raw.model,
            size: raw.size,
            uuid: raw.uuid,
            hctl: raw.hctl,
            serial: raw.serial,
            wwn: raw.wwn,
            vendor: raw.vendor,
            rotational: raw.rota,
            device_type: raw.device_type,
            transport: raw.tran,
            class: DiskClass::from_rotational(raw.rota),
        }
    }
}

impl From<&LsblkDevice> for Partition {
    fn from(raw: &LsblkDevice) -> Self {
        Self {
            name: device_path(&raw.name),
            size: raw.size.clone(),
            fs_type: raw
                .fstype
                .as_deref()
                .map(str::trim)
                .filter(|fs| !fs.is_empty())
                .map(str::to_string),
        }
    }
}

/// Reads disks and partitions through `lsblk`
pub struct Inventory {
    runner: Arc<dyn CommandRunner>,
}

impl Inventory {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn lsblk(&self) -> Result<Vec<LsblkDevice>> {
        let output = self.runner.run("lsblk", &["-O", "-J"])?;
        parse_lsblk(&output.stdout)
    }

    /// Whole disks attached to the host, in `lsblk` order.
    pub fn list_disks(&self) -> Result<Vec<BlockDevice>> {
        udev_settle(self.runner.as_ref())?;

        let disks: Vec<BlockDevice> = self
            .lsblk()?
            .into_iter()
            .map(BlockDevice::from)
            .filter(BlockDevice::is_disk)
            .collect();
        debug!("found {} disk(s)", disks.len());
        Ok(disks)
    }

    /// Current partitions of `disk`; empty when it has none or is gone.
    pub fn list_partitions(&self, disk: &BlockDevice) -> Result<Vec<Partition>> {
        let partitions = self
            .lsblk()?
            .iter()
            .find(|raw| raw.kname == disk.kname)
            .map(|raw| raw.children.iter().map(Partition::from).collect())
            .unwrap_or_default();
        Ok(partitions)
    }
}

#[derive(Debug, Clone, Copy)]
enum Hint {
    Uuid,
    Hctl,
    Name,
    Size,
}

impl Hint {
    /// Evaluation order; the first kind that matches any disk decides.
    const PRIORITY: [Hint; 4] = [Hint::Uuid, Hint::Hctl, Hint::Name, Hint::Size];

    /// The requested value; blank values count as unset, since lsblk
    /// reports a missing attribute as an empty string.
    fn wanted(self, hints: &RootDeviceHints) -> Option<&str> {
        let wanted = match self {
            Hint::Uuid => hints.uuid.as_deref(),
            Hint::Hctl => hints.hctl.as_deref(),
            Hint::Name => hints.name.as_deref(),
            Hint::Size => hints.size.as_deref(),
        };
        wanted.map(str::trim).filter(|value| !value.is_empty())
    }

    fn value(self, disk: &BlockDevice) -> &str {
        match self {
            Hint::Uuid => &disk.uuid,
            Hint::Hctl => &disk.hctl,
            Hint::Name => &disk.name,
            Hint::Size => &disk.size,
        }
    }
}

/// Pick the disk the node's root-device hints select.
pub fn match_device(disks: &[BlockDevice], hints: &RootDeviceHints) -> Result<BlockDevice> {
    for hint in Hint::PRIORITY {
        let Some(wanted) = hint.wanted(hints) else {
            continue;
        };
        if let Some(disk) = disks.iter().find(|disk| hint.value(disk) == wanted) {
            info!("found root disk {} by {:?} {}", disk.name, hint, wanted);
            return Ok(disk.clone());
        }
        debug!("no disk has {:?} {}", hint, wanted);
    }
    Err(SysError::DeviceNotFound(hints.to_string()))
}
