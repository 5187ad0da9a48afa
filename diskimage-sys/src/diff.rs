// SPDX-License-Identifier: GPL-3.0-only

//! Partition snapshot comparison

use std::collections::HashSet;

use diskimage_types::Partition;

use crate::error::{Result, SysError};

/// Partitions in `after` whose names are absent from `before`, in `after` order.
pub fn new_partitions(before: &[Partition], after: &[Partition]) -> Vec<Partition> {
    let known: HashSet<&str> = before.iter().map(|p| p.name.as_str()).collect();
    after
        .iter()
        .filter(|p| !known.contains(p.name.as_str()))
        .cloned()
        .collect()
}

/// The single partition that appeared on `device` between two snapshots.
pub fn created_partition(
    device: &str,
    before: &[Partition],
    after: &[Partition],
) -> Result<Partition> {
    let mut added = new_partitions(before, after);
    match added.len() {
        0 => Err(SysError::NoNewPartition {
            device: device.to_string(),
        }),
        1 => Ok(added.remove(0)),
        _ => Err(SysError::AmbiguousPartitions {
            device: device.to_string(),
            names: added.into_iter().map(|p| p.name).collect(),
        }),
    }
}
