//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shared_types::NetworkId;

/// Offline maintenance of bundled event snapshots.
#[derive(Parser, Debug)]
#[command(name = "ps-events", version)]
#[command(about = "Refresh, verify, inspect and pack privacy-pool event snapshots")]
pub struct Cli {
    /// Networks configuration file (falls back to PS_NETWORKS_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot directory
    #[arg(short, long, global = true, default_value = "snapshots")]
    pub dir: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch new events for a network and rewrite its snapshots
    Sync {
        /// Chain id
        network: NetworkId,

        /// Optional token symbol and/or event name, in any order
        #[arg(num_args = 0..=2)]
        filters: Vec<String>,
    },

    /// Check every snapshot for duplicates and leaf gaps
    Verify,

    /// Event counts and covered block per instance
    Status {
        /// Chain ids (all configured networks when omitted)
        networks: Vec<NetworkId>,

        /// Print Prometheus metrics after the table
        #[arg(long)]
        metrics: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write a gzip copy next to every snapshot
    Pack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_takes_up_to_two_filters() {
        let cli = Cli::try_parse_from(["ps-events", "sync", "1", "dai", "deposit"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Sync {
                network: 1,
                filters: vec!["dai".to_string(), "deposit".to_string()],
            }
        );
        assert!(Cli::try_parse_from(["ps-events", "sync", "1", "a", "b", "c"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli =
            Cli::try_parse_from(["ps-events", "status", "--metrics", "-d", "/tmp/snap"]).unwrap();
        assert_eq!(cli.dir, PathBuf::from("/tmp/snap"));
        assert!(matches!(
            cli.command,
            Command::Status { metrics: true, json: false, ref networks } if networks.is_empty()
        ));
    }
}
