// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the disk image installer
//!
//! This crate defines the types shared by every layer of the installer:
//!
//! - **diskimage-sys**: returns `BlockDevice`, `Partition` and
//!   `NetworkInterface` snapshots built from live system probes
//! - **diskimage-configdrive**: turns `Node` configuration and discovered
//!   interfaces into the `NetworkMetadata` / `MetaData` documents
//! - **diskimage-installer**: loads `Node` inventories and sequences the run
//!
//! Snapshots of host state are never cached; they are rebuilt on every query.

pub mod disk;
pub mod metadata;
pub mod network;
pub mod node;

pub use disk::{BlockDevice, DiskClass, Partition, PartitionTableType};
pub use metadata::{
    BOND_LINK_ID, Link, LinkType, MetaData, Network, NetworkMetadata, NetworkType, Route, Service,
    ServiceType,
};
pub use network::NetworkInterface;
pub use node::{
    BondConfig, ImageInfo, IpmiInfo, LogicalDisk, NetworkConfig, Node, RaidConfig,
    RootDeviceHints,
};
