//! Daemon binary for the mibfs filesystem

use anyhow::Context as _;
use clap::Parser;
use futures_util::stream::StreamExt as _;
use mibfs_core::config::Config;
use mibfs_core::setup::SetupHelper;
use mibfs_core::utils::logging;
use signal_hook_tokio::Signals;
use std::path::{Path, PathBuf};
use std::{fs, process};

/// Run the mibfs daemon in the foreground.
///
/// Exposes values read from a remote SNMP agent as a read-only
/// filesystem at the given mountpoint. Which values are exported,
/// and under which paths, comes from the TOML configuration file.
/// Stop it with SIGTERM; the filesystem is unmounted on the way out.
///
/// By default, outputs errors and warnings to stderr. To configure
/// the output, set the env variable RUST_LOG. Set the env variable
/// RUST_LOG_FORMAT=SYSTEMD to a systemd-friendly log output.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about, verbatim_doc_comment)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: PathBuf,

    /// Directory to mount the filesystem on
    #[arg(long)]
    mountpoint: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_with_info_modules(vec!["mibfsd", "mibfs_core"]);

    if let Err(err) = execute(cli).await {
        eprintln!("ERROR: {err:#}");
        process::exit(1);
    };
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = parse_config(&cli.config)
        .with_context(|| format!("{}: failed to read TOML config file", cli.config.display()))?;

    let helper = SetupHelper::setup(config).await?;
    let fuse = helper.export_fuse(&cli.mountpoint)?;

    let mut signals = Signals::new([
        signal_hook::consts::SIGHUP,
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGQUIT,
    ])?;

    log::info!("Serving on {}", cli.mountpoint.display());
    println!("Serving on {}", cli.mountpoint.display());

    let _ = signals.next().await;

    log::info!("Interrupted. Unmounting..");
    signals.handle().close(); // A 2nd signal kills the process
    fuse.join().await?;

    Ok(())
}

fn parse_config(path: &Path) -> anyhow::Result<Config> {
    let content = fs::read_to_string(path)?;

    Ok(toml::from_str(&content)?)
}
