//! Node configuration
//!
//! One `Node` describes a machine to provision. The installer reads an
//! inventory of nodes and never mutates them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::DiskClass;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub name: String,

    /// Chassis serial number used to recognise the local machine
    #[serde(default, rename = "sn")]
    pub serial_number: String,

    #[serde(default)]
    pub ipmi: IpmiInfo,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub root_device: RootDeviceHints,

    #[serde(default)]
    pub image_info: Option<ImageInfo>,

    #[serde(default, rename = "raid")]
    pub raid_config: Option<RaidConfig>,

    #[serde(default)]
    pub availability_zone: String,

    #[serde(default)]
    pub public_keys: BTreeMap<String, String>,

    /// Free-form metadata copied into `meta_data.json`
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IpmiInfo {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub cipher: i32,
    #[serde(default)]
    pub interface: String,
}

impl fmt::Debug for IpmiInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpmiInfo")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("cipher", &self.cipher)
            .field("interface", &self.interface)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub netmask: String,

    #[serde(default)]
    pub gateway: String,

    #[serde(default)]
    pub dns: Vec<String>,

    #[serde(default, deserialize_with = "deserialize_mtu")]
    pub mtu: Option<u32>,

    #[serde(default)]
    pub bond: BondConfig,

    /// Interface (kernel name or MAC) carrying the address when not bonding.
    /// Required when more than one interface has carrier.
    #[serde(default)]
    pub boot_interface: Option<String>,
}

impl NetworkConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BondConfig {
    #[serde(default)]
    pub mode: String,

    #[serde(default)]
    pub hash_policy: String,

    #[serde(default)]
    pub miimon: u32,

    /// Member interfaces, by kernel name or MAC
    #[serde(default)]
    pub links: Vec<String>,

    /// Enslave every interface that has carrier instead of `links`
    #[serde(default, rename = "bond_all_interface")]
    pub bond_all: bool,
}

impl BondConfig {
    /// A bond config left entirely at defaults means "do not bond".
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Root device selectors
///
/// Any single hint selects a disk. Hints are evaluated in the fixed order
/// uuid, hctl, name, size. Other keys (wwn, serial, ...) are accepted and
/// ignored so one richer inventory entry does not fail the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RootDeviceHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hctl: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl RootDeviceHints {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for RootDeviceHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hints: Vec<String> = [
            ("uuid", &self.uuid),
            ("hctl", &self.hctl),
            ("name", &self.name),
            ("size", &self.size),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|value| format!("{key}={value}")))
        .collect();

        if hints.is_empty() {
            f.write_str("<no hints>")
        } else {
            f.write_str(&hints.join(", "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Local path of the image to write
    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub image_url: String,

    #[serde(default)]
    pub disk_format: String,

    #[serde(default, rename = "md5")]
    pub md5_checksum: String,
}

/// RAID layout request. Parsed so inventories validate, not acted on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RaidConfig {
    #[serde(default)]
    pub logical_disks: Vec<LogicalDisk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogicalDisk {
    /// "JBOD", "0", "1", "5", "6", "1+0", "5+0" or "6+0"
    #[serde(default)]
    pub raid_level: String,

    #[serde(default)]
    pub size_gb: Option<u64>,

    #[serde(default)]
    pub volume_name: String,

    #[serde(default)]
    pub is_root_volume: bool,

    #[serde(default)]
    pub disk_type: Option<DiskClass>,

    /// "sas", "scsi" or "sata"
    #[serde(default)]
    pub interface_type: String,

    #[serde(default)]
    pub controller: String,

    #[serde(default)]
    pub physical_disks: Vec<String>,

    #[serde(default)]
    pub number_of_physical_disks: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u32),
    String(String),
}

/// Older inventories quote the MTU; accept both forms.
fn deserialize_mtu<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(mtu)) => Ok(Some(mtu)),
        Some(NumberOrString::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(NumberOrString::String(raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid mtu '{raw}'"))),
    }
}
