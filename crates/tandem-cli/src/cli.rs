//! Clap CLI definitions for Tandem.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const AFTER_HELP: &str = "\
\x1b[1;36mExamples:\x1b[0m
  tandem run                    Start a node (first node becomes the server)
  tandem run --address 10.0.0.2 Start a node that pairs with 10.0.0.2
  tandem probe                  Check whether a peer is listening
  tandem swap                   Ask the server to exchange roles
  tandem config                 Print the effective configuration

\x1b[1;36mWhile running:\x1b[0m
  Type `r` (or `swap`) and press Enter on the client to exchange roles.";

/// Tandem, a self-organizing two-role network peer.
#[derive(Parser)]
#[command(
    name = "tandem",
    version,
    about = "Tandem \u{2014} self-organizing two-role network peer",
    after_help = AFTER_HELP,
)]
pub struct Cli {
    /// Path to config file (default: ~/.tandem/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Peer address to probe and connect to.
    #[arg(long, global = true)]
    pub address: Option<String>,

    /// Protocol port, shared by both roles.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a node and keep it running until Ctrl+C.
    Run {
        /// Do not read swap commands from stdin.
        #[arg(long)]
        no_stdin: bool,
    },
    /// Probe the peer once (exit 0 if something is listening).
    Probe,
    /// Send one ROLE_SWITCH to the peer (exit 0 if delivered).
    Swap,
    /// Print the effective configuration as TOML.
    Config,
}
