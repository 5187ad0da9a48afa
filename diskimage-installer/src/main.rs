// SPDX-License-Identifier: GPL-3.0-only

//! diskimage-installer - write an OS image to the root disk of this machine

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use diskimage_installer::error::InstallError;
use diskimage_installer::logging::{self, LoggingLevel};
use diskimage_installer::{Installer, Settings, node, tools};
use diskimage_sys::{CommandRunner, SystemRunner};

#[derive(Debug, Parser)]
#[command(name = "diskimage-installer", version)]
#[command(about = "Install a disk image onto the root disk and attach a config drive")]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .multiple(true)
        .args(["image", "nodeconfig"])
))]
struct Cli {
    #[arg(long, value_enum, default_value_t = LoggingLevel::Info)]
    log_level: LoggingLevel,

    /// Node inventory (YAML, JSON or TOML); the entry matching this host's serial is installed
    #[arg(long)]
    nodeconfig: Option<PathBuf>,

    /// Image to write; overrides the inventory's image when both are given
    #[arg(long)]
    image: Option<PathBuf>,

    /// Root disk for an install without an inventory
    #[arg(long, default_value = "/dev/sda")]
    root_disk: String,

    /// Installer settings (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let _log_guard = logging::init(cli.log_level, settings.log_dir.as_deref());

    tracing::info!("Starting diskimage-installer v{}", env!("CARGO_PKG_VERSION"));

    if unsafe { libc::geteuid() } != 0 {
        tracing::error!("diskimage-installer must run as root");
        return Err(InstallError::PrivilegeRequired.into());
    }

    tools::ensure_installed(&tools::required_tools(cli.nodeconfig.is_some()))?;

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let mut node = match (&cli.nodeconfig, &cli.image) {
        (Some(path), _) => {
            let nodes = node::load_nodes(path)?;
            let serial = node::local_serial(runner.as_ref())?;
            node::find_local_node(nodes, &serial)?
        }
        (None, Some(image)) => node::image_only(image, &cli.root_disk),
        (None, None) => anyhow::bail!("either --image or --nodeconfig is required"),
    };
    if let Some(image) = &cli.image {
        node.image_info.get_or_insert_with(Default::default).image = image.display().to_string();
    }

    Installer::new(node, runner, settings)
        .install_os()
        .context("installation failed")?;

    tracing::info!("installation finished");
    Ok(())
}
