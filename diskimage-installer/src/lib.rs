// SPDX-License-Identifier: GPL-3.0-only

//! Bare-metal disk image installer
//!
//! Writes an OS image to the local root disk and, when the node carries a
//! network configuration, appends a cloud-init config drive to it.

pub mod config;
pub mod error;
pub mod image;
pub mod installer;
pub mod logging;
pub mod node;
pub mod tools;

pub use config::Settings;
pub use error::{InstallError, Result};
pub use installer::Installer;
