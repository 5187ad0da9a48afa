// SPDX-License-Identifier: GPL-3.0-only

//! Physical network interface discovery from sysfs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use diskimage_types::NetworkInterface;
use tracing::{debug, trace};

use crate::cmd::CommandRunner;
use crate::error::{Result, SysError};

fn read_attr(interface: &Path, attr: &str) -> io::Result<String> {
    Ok(fs::read_to_string(interface.join(attr))?.trim().to_string())
}

pub struct NetDiscovery {
    runner: Arc<dyn CommandRunner>,
    sysfs_root: PathBuf,
}

impl NetDiscovery {
    pub fn new(runner: Arc<dyn CommandRunner>, sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            sysfs_root: sysfs_root.into(),
        }
    }

    /// Interfaces backed by a device, ordered by kernel interface index.
    ///
    /// Loopback, bridges, bonds and other virtual interfaces have no
    /// `device` link and are skipped.
    pub fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let class = self.sysfs_root.join("class/net");
        let mut found = Vec::new();

        for entry in fs::read_dir(&class)? {
            let path = entry?.path();
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !path.join("device").exists() {
                trace!("skipping virtual interface {}", name);
                continue;
            }

            let ifindex: u32 = read_attr(&path, "ifindex")?
                .parse()
                .map_err(|e| SysError::parse(format!("ifindex of {name}"), e))?;
            let mac_address = read_attr(&path, "address")?;
            // Reading carrier fails with EINVAL while the link is down.
            let has_carrier = read_attr(&path, "carrier").is_ok_and(|value| value == "1");
            let speed = read_attr(&path, "speed")
                .ok()
                .and_then(|value| value.parse::<i64>().ok())
                .and_then(|value| u32::try_from(value).ok());
            let bios_name = self.bios_name(&name)?;

            debug!(
                "interface {} ({}) carrier={} speed={:?}",
                name, mac_address, has_carrier, speed
            );
            found.push((
                ifindex,
                NetworkInterface {
                    name,
                    bios_name,
                    mac_address,
                    has_carrier,
                    speed,
                },
            ));
        }

        found.sort_by_key(|(ifindex, _)| *ifindex);
        Ok(found.into_iter().map(|(_, interface)| interface).collect())
    }

    /// Firmware-assigned name of `interface`, when the platform provides one.
    fn bios_name(&self, interface: &str) -> Result<Option<String>> {
        let output = match self.runner.output("biosdevname", &["-i", interface]) {
            Ok(output) => output,
            Err(SysError::Spawn { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!("biosdevname is not installed");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match output.code {
            Some(0) => {
                let name = output.stdout.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Some(2) => {
                debug!("no BIOS naming information for {}", interface);
                Ok(None)
            }
            Some(4) => {
                debug!("biosdevname does not name interfaces of virtual machines");
                Ok(None)
            }
            _ => output.check().map(|_| None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use tempfile::TempDir;

    fn interface(root: &Path, name: &str, attrs: &[(&str, &str)], physical: bool) {
        let dir = root.join("class/net").join(name);
        fs::create_dir_all(&dir).unwrap();
        if physical {
            fs::create_dir(dir.join("device")).unwrap();
        }
        for (attr, value) in attrs {
            fs::write(dir.join(attr), format!("{value}\n")).unwrap();
        }
    }

    fn fixture() -> TempDir {
        let root = tempfile::tempdir().unwrap();
        interface(
            root.path(),
            "lo",
            &[("ifindex", "1"), ("address", "00:00:00:00:00:00"), ("carrier", "1")],
            false,
        );
        interface(
            root.path(),
            "eno2",
            &[
                ("ifindex", "3"),
                ("address", "3c:ec:ef:10:20:31"),
                ("carrier", "1"),
                ("speed", "10000"),
            ],
            true,
        );
        // No carrier file: the kernel refuses the read while the link is down.
        interface(
            root.path(),
            "eno1",
            &[("ifindex", "2"), ("address", "3c:ec:ef:10:20:30"), ("speed", "-1")],
            true,
        );
        interface(
            root.path(),
            "bond0",
            &[("ifindex", "4"), ("address", "3c:ec:ef:10:20:31"), ("carrier", "1")],
            false,
        );
        root
    }

    #[test]
    fn discovers_physical_interfaces_in_index_order() {
        let root = fixture();
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("biosdevname -i eno2", "em2\n");
        runner.exit("biosdevname -i eno1", 2, "", "");

        let interfaces = NetDiscovery::new(runner, root.path()).interfaces().unwrap();

        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].name, "eno1");
        assert!(!interfaces[0].has_carrier);
        assert_eq!(interfaces[0].speed, None);
        assert_eq!(interfaces[0].bios_name, None);

        assert_eq!(interfaces[1].name, "eno2");
        assert_eq!(interfaces[1].mac_address, "3c:ec:ef:10:20:31");
        assert!(interfaces[1].has_carrier);
        assert_eq!(interfaces[1].speed, Some(10000));
        assert_eq!(interfaces[1].bios_name.as_deref(), Some("em2"));
    }

    #[test]
    fn biosdevname_advisories_are_ignored() {
        let root = fixture();
        let runner = Arc::new(ScriptedRunner::new());
        runner.exit("biosdevname -i eno1", 4, "", "");
        runner.missing("biosdevname -i eno2");

        let interfaces = NetDiscovery::new(runner, root.path()).interfaces().unwrap();
        assert!(interfaces.iter().all(|i| i.bios_name.is_none()));
    }

    #[test]
    fn other_biosdevname_failures_are_fatal() {
        let root = fixture();
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail("biosdevname -i eno1", 1, "cannot open /dev/mem");

        let error = NetDiscovery::new(runner, root.path())
            .interfaces()
            .unwrap_err();
        assert!(error.to_string().contains("cannot open /dev/mem"));
    }

    #[test]
    fn missing_sysfs_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        assert!(matches!(
            NetDiscovery::new(runner, root.path()).interfaces(),
            Err(SysError::Io(_))
        ));
    }
}
