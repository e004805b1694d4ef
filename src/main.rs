use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lutron_caseta_mcp::cli::{Cli, Commands, print_pairing_result, print_status, run_pair, run_status};
use lutron_caseta_mcp::config::{env_lookup, load_config, pairing_identity_dir};
use lutron_caseta_mcp::{BridgeSession, LeapConnector, LeapPairing, McpServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Determine if we're in MCP mode (no command or serve command)
    let is_mcp_mode = cli.is_mcp_mode();

    // Initialize logging to stderr (stdout is used for MCP protocol in MCP mode)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        // In CLI mode, use a more compact format
        .with_ansi(!is_mcp_mode)
        .init();

    let pairing = Arc::new(LeapPairing::new(pairing_identity_dir(&env_lookup)));

    match cli.command {
        None | Some(Commands::Serve) => {
            let config = load_config();
            tokio::fs::create_dir_all(&config.cert_dir)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create certificate directory {}",
                        config.cert_dir.display()
                    )
                })?;
            info!(cert_dir = %config.cert_dir.display(), "Starting Lutron Caseta MCP server");

            let session = Arc::new(BridgeSession::new(Arc::new(LeapConnector::new()), pairing));
            session.initialize().await;

            let server = Arc::new(McpServer::new(session));
            server.run().await?;
        }
        Some(Commands::Pair {
            bridge_ip,
            output_dir,
        }) => {
            let result = run_pair(
                pairing,
                &bridge_ip,
                output_dir.as_deref(),
                load_config().cert_dir,
            )
            .await?;
            print_pairing_result(&mut std::io::stdout(), &result)?;
            if !result.success {
                std::process::exit(1);
            }
        }
        Some(Commands::Status) => {
            let session = BridgeSession::new(Arc::new(LeapConnector::new()), pairing);
            let status = run_status(&session).await;
            print_status(&mut std::io::stdout(), &status)?;
        }
    }

    Ok(())
}
