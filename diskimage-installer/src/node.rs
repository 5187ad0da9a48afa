// SPDX-License-Identifier: GPL-3.0-only

//! Node inventory loading and local node selection

use std::fs;
use std::path::Path;

use diskimage_sys::CommandRunner;
use diskimage_types::{ImageInfo, Node, RootDeviceHints};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{InstallError, Result};

/// TOML inventories wrap the list in a `[[nodes]]` array.
#[derive(Debug, Deserialize)]
struct NodeTable {
    #[serde(default)]
    nodes: Vec<Node>,
}

/// Read a node inventory: a YAML (or JSON) list, or TOML with `[[nodes]]`.
pub fn load_nodes(path: &Path) -> Result<Vec<Node>> {
    let invalid = |reason: String| InstallError::Inventory {
        path: path.to_path_buf(),
        reason,
    };

    let raw = fs::read_to_string(path).map_err(|error| invalid(error.to_string()))?;
    let nodes = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str::<NodeTable>(&raw)
            .map(|table| table.nodes)
            .map_err(|error| invalid(error.to_string()))?
    } else {
        serde_yaml::from_str::<Vec<Node>>(&raw).map_err(|error| invalid(error.to_string()))?
    };

    debug!("loaded {} node(s) from {}", nodes.len(), path.display());
    Ok(nodes)
}

/// Chassis serial number from `lshw -json`.
///
/// Depending on the version, lshw prints the system node either as an object
/// or as a single-element array.
pub fn parse_lshw_serial(json: &str) -> Result<String> {
    let parsed: Value = serde_json::from_str(json).map_err(|error| InstallError::Parse {
        what: "lshw output",
        reason: error.to_string(),
    })?;

    let system = match &parsed {
        Value::Array(items) => items.first(),
        other => Some(other),
    };

    system
        .and_then(|system| system.get("serial"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|serial| !serial.is_empty())
        .map(str::to_string)
        .ok_or_else(|| InstallError::Parse {
            what: "lshw output",
            reason: "no serial number reported for this host".to_string(),
        })
}

pub fn local_serial(runner: &dyn CommandRunner) -> Result<String> {
    let output = runner.run("lshw", &["-quiet", "-json"])?;
    let serial = parse_lshw_serial(&output.stdout)?;
    info!("local serial number is {}", serial);
    Ok(serial)
}

/// The inventory entry for the machine with `serial`.
pub fn find_local_node(nodes: Vec<Node>, serial: &str) -> Result<Node> {
    nodes
        .into_iter()
        .find(|node| node.serial_number == serial)
        .ok_or_else(|| InstallError::NodeNotFound(serial.to_string()))
}

/// Node for a plain image install without an inventory.
pub fn image_only(image: &Path, root_disk: &str) -> Node {
    Node {
        image_info: Some(ImageInfo {
            image: image.display().to_string(),
            ..Default::default()
        }),
        root_device: RootDeviceHints::by_name(root_disk),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskimage_sys::testing::ScriptedRunner;
    use std::io::Write;

    fn inventory(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_yaml_inventory() {
        let file = inventory(
            ".yaml",
            r#"
- name: compute-01
  sn: CZ21150HJK
  network:
    address: 10.20.0.11
    netmask: 255.255.255.0
    gateway: 10.20.0.1
    dns: [10.20.0.2]
  root_device:
    hctl: "0:0:0:0"
  image_info:
    image: /images/ubuntu-22.04.qcow2
- name: compute-02
  sn: CZ21150HJL
"#,
        );

        let nodes = load_nodes(file.path()).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].root_device.hctl.as_deref(), Some("0:0:0:0"));
        assert_eq!(nodes[0].network.dns, vec!["10.20.0.2"]);
        assert!(nodes[1].network.is_empty());
    }

    #[test]
    fn loads_json_through_the_yaml_reader() {
        let file = inventory(".json", r#"[{"name": "compute-03", "sn": "SN3"}]"#);
        let nodes = load_nodes(file.path()).unwrap();
        assert_eq!(nodes[0].serial_number, "SN3");
    }

    #[test]
    fn loads_toml_inventory() {
        let file = inventory(
            ".toml",
            r#"
[[nodes]]
name = "compute-04"
sn = "SN4"

[nodes.root_device]
name = "/dev/nvme0n1"
"#,
        );
        let nodes = load_nodes(file.path()).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].root_device.name.as_deref(), Some("/dev/nvme0n1"));
    }

    #[test]
    fn malformed_inventory_names_the_file() {
        let file = inventory(".yaml", "name: [unterminated");
        let error = load_nodes(file.path()).unwrap_err();
        assert!(matches!(error, InstallError::Inventory { .. }));
    }

    #[test]
    fn reads_serial_from_object_or_array() {
        let object = r#"{"id": "compute-01", "class": "system", "serial": "CZ21150HJK"}"#;
        assert_eq!(parse_lshw_serial(object).unwrap(), "CZ21150HJK");

        let array = r#"[{"id": "compute-01", "class": "system", "serial": "CZ21150HJK"}]"#;
        assert_eq!(parse_lshw_serial(array).unwrap(), "CZ21150HJK");
    }

    #[test]
    fn missing_serial_is_an_error() {
        assert!(parse_lshw_serial(r#"{"id": "vm"}"#).is_err());
        assert!(parse_lshw_serial(r#"{"serial": "  "}"#).is_err());
        assert!(parse_lshw_serial("[]").is_err());
        assert!(parse_lshw_serial("not json").is_err());
    }

    #[test]
    fn selects_the_node_matching_the_local_serial() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "lshw -quiet -json",
            r#"{"id": "compute-02", "serial": "CZ21150HJL"}"#,
        );
        let nodes = vec![
            Node {
                name: "compute-01".to_string(),
                serial_number: "CZ21150HJK".to_string(),
                ..Default::default()
            },
            Node {
                name: "compute-02".to_string(),
                serial_number: "CZ21150HJL".to_string(),
                ..Default::default()
            },
        ];

        let serial = local_serial(&runner).unwrap();
        assert_eq!(find_local_node(nodes.clone(), &serial).unwrap().name, "compute-02");
        assert!(matches!(
            find_local_node(nodes, "OTHER"),
            Err(InstallError::NodeNotFound(_))
        ));
    }

    #[test]
    fn image_only_node_targets_the_root_disk() {
        let node = image_only(Path::new("/images/os.raw"), "/dev/sdb");
        assert_eq!(node.image_info.unwrap().image, "/images/os.raw");
        assert_eq!(node.root_device, RootDeviceHints::by_name("/dev/sdb"));
        assert!(node.network.is_empty());
    }
}
