//! Config-drive documents
//!
//! `NetworkMetadata` is serialized as `network_data.json` and `MetaData` as
//! `meta_data.json`, using the OpenStack config-drive field names that
//! cloud-init reads on first boot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Id of the single synthesized bond link. cloud-init names bonds `bond%d`.
pub const BOND_LINK_ID: &str = "bond0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    #[default]
    Phy,
    Vlan,
    Bond,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Link {
    pub id: String,

    #[serde(rename = "type")]
    pub link_type: LinkType,

    #[serde(rename = "ethernet_mac_address", skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,

    #[serde(rename = "bond-master", skip_serializing_if = "Option::is_none")]
    pub bond_master: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bond_links: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond_mode: Option<String>,

    #[serde(rename = "bond_xmit_hash_policy", skip_serializing_if = "Option::is_none")]
    pub bond_hash_policy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond_miimon: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_link: Option<String>,

    #[serde(rename = "vlan_mac_address", skip_serializing_if = "Option::is_none")]
    pub vlan_mac: Option<String>,
}

impl Link {
    pub fn is_type(&self, link_type: LinkType) -> bool {
        self.link_type == link_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Static,
    Dhcp4,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub network: String,
    pub netmask: String,
    pub gateway: String,
}

impl Route {
    /// `0.0.0.0/0.0.0.0` via `gateway`
    pub fn default_via(gateway: impl Into<String>) -> Self {
        Self {
            network: "0.0.0.0".to_string(),
            netmask: "0.0.0.0".to_string(),
            gateway: gateway.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,

    /// Id of the owning `Link`
    pub link: String,

    #[serde(rename = "type")]
    pub network_type: NetworkType,

    pub ip_address: String,

    pub netmask: String,

    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Dns,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "type")]
    pub service_type: ServiceType,

    pub address: String,
}

impl Service {
    pub fn dns(address: impl Into<String>) -> Self {
        Self {
            service_type: ServiceType::Dns,
            address: address.into(),
        }
    }
}

/// Contents of `network_data.json`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkMetadata {
    pub links: Vec<Link>,
    pub networks: Vec<Network>,
    pub services: Vec<Service>,
}

impl NetworkMetadata {
    pub fn link(&self, id: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.id == id)
    }

    /// Describe every cross reference that does not resolve.
    ///
    /// Link ids must be unique, a network must name an existing link, and a
    /// `bond-master` must name a link of type bond. An empty result means the
    /// document is consistent.
    pub fn reference_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let mut ids = BTreeSet::new();
        for link in &self.links {
            if !ids.insert(link.id.as_str()) {
                errors.push(format!("link {} is defined more than once", link.id));
            }
        }

        for network in &self.networks {
            if self.link(&network.link).is_none() {
                errors.push(format!(
                    "network {} references unknown link {}",
                    network.id, network.link
                ));
            }
        }

        for link in &self.links {
            let Some(master) = link.bond_master.as_deref() else {
                continue;
            };
            match self.link(master) {
                Some(bond) if bond.is_type(LinkType::Bond) => {}
                Some(_) => errors.push(format!(
                    "link {} has bond-master {} which is not a bond",
                    link.id, master
                )),
                None => errors.push(format!(
                    "link {} has unknown bond-master {}",
                    link.id, master
                )),
            }
        }

        errors
    }
}

/// Contents of `meta_data.json`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetaData {
    pub availability_zone: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    pub hostname: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,

    pub public_keys: BTreeMap<String, String>,

    pub uuid: String,
}
