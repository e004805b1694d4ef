//! CLI runner functions
//!
//! These functions execute CLI commands by reusing the pairing flow and
//! the bridge session the MCP server uses.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::domain::{BridgeSession, PairingFlow, PairingResult, SessionStatus};
use crate::error::Result;
use crate::ports::PairingPrimitive;
use crate::security::{validate_cert_directory, validate_host_ip};

/// Pair with the bridge at `bridge_ip`, writing certificates to
/// `output_dir` or `default_dir`.
///
/// The button prompt is printed to the console.
///
/// # Errors
///
/// Returns a validation error if the address or directory is invalid.
/// Pairing failures are reported in the returned result.
pub async fn run_pair(
    pairing: Arc<dyn PairingPrimitive>,
    bridge_ip: &str,
    output_dir: Option<&Path>,
    default_dir: PathBuf,
) -> Result<PairingResult> {
    let address = validate_host_ip(bridge_ip)?;
    let dir = match output_dir {
        Some(dir) => validate_cert_directory(&dir.to_string_lossy())?,
        None => default_dir,
    };

    println!("Lutron Caseta Bridge Pairing");
    println!("============================");
    println!("Bridge IP: {address}");
    println!("Output directory: {}\n", dir.display());

    info!(address = %address, "Pairing from command line");
    Ok(PairingFlow::new(pairing).pair(&address, &dir, None).await)
}

/// Print a pairing outcome.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn print_pairing_result(out: &mut impl Write, result: &PairingResult) -> io::Result<()> {
    if !result.success {
        return writeln!(out, "Error: {}", result.message);
    }

    writeln!(out, "{}", result.message)?;
    if let Some(data) = &result.data {
        writeln!(out, "\nFiles created:")?;
        writeln!(out, "  - {} (CA certificate)", data.ca_path.display())?;
        writeln!(out, "  - {} (Client certificate)", data.cert_path.display())?;
        writeln!(out, "  - {} (Private key)", data.key_path.display())?;
    }
    writeln!(out, "\nYou can now start the MCP server with these certificates.")
}

/// Initialize the session, snapshot its status and tear it down again.
pub async fn run_status(session: &BridgeSession) -> SessionStatus {
    session.initialize().await;
    let status = session.status().await;
    session.cleanup().await;
    status
}

/// Print a status snapshot.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn print_status(out: &mut impl Write, status: &SessionStatus) -> io::Result<()> {
    let mark = |present: bool| if present { "present" } else { "missing" };

    writeln!(out, "Lutron Caseta MCP Status")?;
    writeln!(out, "========================\n")?;
    writeln!(
        out,
        "Bridge IP: {}",
        status.bridge_ip.as_deref().unwrap_or("(not configured)")
    )?;
    writeln!(out, "Certificate directory: {}", status.cert_dir.display())?;
    writeln!(out, "\nCertificates:")?;
    writeln!(out, "  CA:   {}", mark(status.certificates.ca))?;
    writeln!(out, "  Cert: {}", mark(status.certificates.cert))?;
    writeln!(out, "  Key:  {}", mark(status.certificates.key))?;
    writeln!(
        out,
        "\nConnection: {}",
        if status.connected {
            "connected"
        } else {
            "not connected"
        }
    )
}
