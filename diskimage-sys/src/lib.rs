// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for the disk image installer
//!
//! This crate drives the host tools the installer depends on:
//! - Partition table detection, GPT repair and partition creation
//! - Block device and partition inventory
//! - Physical network interface discovery
//! - Raw block copies onto a partition
//!
//! These operations require root and act on whole disks.

pub mod cmd;
pub mod copy;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod net;
pub mod retry;
pub mod table;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cmd::{CommandOutput, CommandRunner, SystemRunner};
pub use copy::{block_copy, disk_signature};
pub use diff::{created_partition, new_partitions};
pub use error::{Result, SysError};
pub use inventory::{Inventory, match_device};
pub use net::NetDiscovery;
pub use retry::RetryPolicy;
pub use table::{DEFAULT_CONFIG_DRIVE_MIB, MAX_MBR_DISK_SIZE_MIB, PartitionTable};
