//! quorum-lock - command line driver for the quorum lock
//!
//! Subcommands:
//! - `simulate`: contending holders over in-memory replicas, reports lost updates
//! - `hold`: acquire, keep extended, then release a lock on Redis nodes (feature: `redis`)

mod cli;
#[cfg(feature = "redis")]
mod hold;
mod logging;
mod simulate;

use anyhow::Context;
use clap::Parser;
use quorum_lock_core::LockSettings;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let settings =
        LockSettings::load(cli.config.as_deref()).context("failed to load lock settings")?;
    tracing::debug!(?settings, "Loaded lock settings");

    match cli.command {
        Command::Simulate(args) => {
            let report = simulate::run(args, settings.to_options()).await?;
            println!("{}", report);
            if report.lost_updates() > 0 {
                anyhow::bail!("{} update(s) lost", report.lost_updates());
            }
        }
        #[cfg(feature = "redis")]
        Command::Hold(args) => hold::run(args, settings.to_options()).await?,
    }

    Ok(())
}
