use serde::{Deserialize, Serialize};

/// Physical network interface as read from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Kernel interface name (e.g., "eno1")
    pub name: String,

    /// Name assigned by firmware, when `biosdevname` can tell
    pub bios_name: Option<String>,

    pub mac_address: String,

    /// Link-layer carrier detected
    pub has_carrier: bool,

    /// Link speed in Mb/s; unknown while the link is down
    pub speed: Option<u32>,
}

impl NetworkInterface {
    /// Whether `reference` names this interface, by kernel name or MAC.
    pub fn is_named(&self, reference: &str) -> bool {
        self.name == reference || self.mac_address.eq_ignore_ascii_case(reference)
    }
}
