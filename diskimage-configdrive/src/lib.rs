// SPDX-License-Identifier: GPL-3.0-only

//! Config-drive synthesis
//!
//! Turns a node's configuration and the host's discovered interfaces into the
//! OpenStack `meta_data.json` / `network_data.json` documents and packages
//! them as a `config-2` ISO image for cloud-init.

pub mod drive;
pub mod error;
pub mod network;

pub use drive::{ConfigDrive, ConfigDriveBuilder, METADATA_VERSIONS, VOLUME_LABEL, metadata_for};
pub use error::{ConfigDriveError, Result};
pub use network::synthesize;
