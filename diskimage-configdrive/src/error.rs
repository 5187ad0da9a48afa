// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use diskimage_sys::SysError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigDriveError {
    #[error("no network interface has carrier")]
    NoCarrier,

    #[error("interface {0} has no carrier")]
    NoCarrierOn(String),

    #[error("host has no interface {0}")]
    MissingInterface(String),

    #[error(
        "more than one interface has carrier ({}), set boot_interface to pick one",
        .0.join(", ")
    )]
    AmbiguousBootInterface(Vec<String>),

    #[error("bond has no member interfaces")]
    EmptyBond,

    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("inconsistent network metadata: {}", .0.join("; "))]
    InconsistentMetadata(Vec<String>),

    #[error(
        "config drive {} is {size} bytes, larger than the {max_mib} MiB partition",
        .path.display()
    )]
    Oversize {
        path: PathBuf,
        size: u64,
        max_mib: u64,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Sys(#[from] SysError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigDriveError>;
