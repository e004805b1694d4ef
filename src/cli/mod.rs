//! CLI module for direct command-line usage
//!
//! Standalone pairing and a status report, without going through the MCP
//! protocol.

mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use runner::{print_pairing_result, print_status, run_pair, run_status};

/// Lutron Caseta MCP - Pair with and control a Caseta Smart Bridge
#[derive(Parser)]
#[command(name = "lutron-caseta-mcp")]
#[command(about = "MCP server for pairing with and controlling a Lutron Caseta Smart Bridge")]
#[command(version)]
#[command(after_help = "ENVIRONMENT:
    BRIDGE_ADDRESS         IP address of the bridge (legacy: LUTRON_BRIDGE_IP)
    CERT_DIRECTORY         Certificate directory (legacy: LUTRON_CERT_DIR)
    PAIRING_IDENTITY_DIR   Directory with pairing.crt / pairing.key for the pairing port
    RUST_LOG               Log filter (default: info)

CERTIFICATE FILES:
    caseta-bridge.crt      Bridge CA certificate
    caseta.crt             Client certificate
    caseta.key             Client private key

EXAMPLES:
    # Start MCP server (default mode)
    lutron-caseta-mcp

    # Pair with a bridge and save certificates to the default directory
    lutron-caseta-mcp pair 192.168.1.100

    # Pair and save certificates elsewhere
    lutron-caseta-mcp pair 192.168.1.100 --output-dir ./certs

    # Show configuration and try to connect
    lutron-caseta-mcp status")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start MCP server (JSON-RPC over stdio) - same as running without arguments
    Serve,

    /// Pair with a bridge and save its certificate files
    Pair {
        /// IP address of the bridge
        bridge_ip: String,

        /// Directory to write the certificate files to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Show configuration, certificate files and connectivity
    Status,
}

impl Cli {
    /// Whether the process will speak MCP on stdio.
    #[must_use]
    pub const fn is_mcp_mode(&self) -> bool {
        matches!(self.command, None | Some(Commands::Serve))
    }
}
