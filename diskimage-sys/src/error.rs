// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

use diskimage_types::PartitionTableType;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed ({}): {output}", exit_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("cannot parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("cannot create a partition on {device}: unsupported layout {layout}")]
    UnsupportedLayout {
        device: String,
        layout: PartitionTableType,
    },

    #[error("a {size_mib} MiB partition does not fit below the {max_mib} MiB MBR limit")]
    PartitionTooLarge { size_mib: u64, max_mib: u64 },

    #[error("no new partition appeared on {device}")]
    NoNewPartition { device: String },

    #[error("more than one new partition appeared on {device}: {}", .names.join(", "))]
    AmbiguousPartitions { device: String, names: Vec<String> },
}

impl SysError {
    pub(crate) fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
