//! # ps-events
//!
//! Offline operator tool for the bundled event snapshots:
//!
//! - `sync <network> [token] [event]` - fetch new events and rewrite snapshots
//! - `verify` - fail when any snapshot holds duplicates or leaf gaps
//! - `status [networks...] [--metrics] [--json]` - counts and covered blocks
//! - `pack` - gzip every snapshot next to its plain copy
//!
//! Any fatal error exits with a non-zero status.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use ps_telemetry::{init_telemetry, TelemetryConfig};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::for_tool("ps-events");
    if cli.verbose {
        telemetry = telemetry.with_log_level("debug");
    }
    let _guard = init_telemetry(telemetry)?;

    let output = match cli.command {
        Command::Sync { network, filters } => {
            let networks = commands::load_networks(cli.config)?;
            commands::sync(networks, &cli.dir, network, &filters).await?
        }
        Command::Verify => commands::verify(&cli.dir).await?,
        Command::Status {
            networks: ids,
            metrics,
            json,
        } => {
            let networks = commands::load_networks(cli.config)?;
            commands::status(&networks, &cli.dir, &ids, metrics, json).await?
        }
        Command::Pack => commands::pack(&cli.dir).await?,
    };

    print!("{output}");
    Ok(())
}
