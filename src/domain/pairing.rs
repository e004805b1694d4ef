//! Pairing Flow
//!
//! Drives the one-time pairing handshake and persists the resulting
//! credentials. Every outcome is reported as a [`PairingResult`]; errors
//! never escape [`PairingFlow::pair`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};

use super::credentials::CredentialStore;
use crate::error::{BridgeError, Result};
use crate::ports::{PairingPrimitive, ReadyNotifier};

/// Files written by a successful pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingArtifacts {
    pub version: String,
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Outcome of a pairing attempt. `success` is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PairingArtifacts>,
}

impl PairingResult {
    fn succeeded(output_dir: &Path, artifacts: PairingArtifacts) -> Self {
        let dir = std::path::absolute(output_dir).unwrap_or_else(|_| output_dir.to_path_buf());
        Self {
            success: true,
            message: format!(
                "Successfully paired with {}. Certificate files saved to: {}",
                artifacts.version,
                dir.display()
            ),
            data: Some(artifacts),
        }
    }

    fn failed(error: &BridgeError) -> Self {
        Self {
            success: false,
            message: format!("Pairing failed: {error}"),
            data: None,
        }
    }
}

/// Runs pairing attempts one at a time.
pub struct PairingFlow {
    primitive: Arc<dyn PairingPrimitive>,
    in_progress: Mutex<()>,
}

impl PairingFlow {
    #[must_use]
    pub fn new(primitive: Arc<dyn PairingPrimitive>) -> Self {
        Self {
            primitive,
            in_progress: Mutex::new(()),
        }
    }

    /// Pair with the bridge at `address` and write credentials to
    /// `output_dir`.
    ///
    /// `ready` is fulfilled when the bridge waits for its button to be
    /// pressed; without it a prompt is printed to the console. The address
    /// is expected to be validated by the caller. A second attempt while
    /// one is running fails immediately instead of queueing.
    pub async fn pair(
        &self,
        address: &str,
        output_dir: &Path,
        ready: Option<oneshot::Sender<()>>,
    ) -> PairingResult {
        let Ok(_guard) = self.in_progress.try_lock() else {
            warn!(address = %address, "Rejected concurrent pairing attempt");
            return PairingResult::failed(&BridgeError::PairingInProgress);
        };

        let notifier = ready.map_or(ReadyNotifier::Console, ReadyNotifier::Channel);
        info!(address = %address, output_dir = %output_dir.display(), "Starting pairing");

        match self.run(address, output_dir, notifier).await {
            Ok(artifacts) => {
                info!(address = %address, version = %artifacts.version, "Pairing succeeded");
                PairingResult::succeeded(output_dir, artifacts)
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Pairing failed");
                PairingResult::failed(&e)
            }
        }
    }

    async fn run(
        &self,
        address: &str,
        output_dir: &Path,
        notifier: ReadyNotifier,
    ) -> Result<PairingArtifacts> {
        let bundle = self.primitive.pair(address, notifier).await?;
        let version = bundle.version.clone();
        let paths = CredentialStore::new(output_dir).save(bundle).await?;

        Ok(PairingArtifacts {
            version,
            ca_path: paths.ca,
            cert_path: paths.cert,
            key_path: paths.key,
        })
    }
}
