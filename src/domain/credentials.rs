//! Credential Store
//!
//! Reports which of the three credential files exist in a certificate
//! directory and persists a freshly paired [`CredentialBundle`].
//!
//! Persisting stages every file as a temporary sibling first and only then
//! renames them into place (CA, cert, key). A failure while staging leaves
//! the previous set untouched; a failure between renames can still leave a
//! mixed set, which [`CredentialStore::check`] reports.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info};

use crate::config::CredentialPaths;
use crate::error::{BridgeError, Result};
use crate::ports::CredentialBundle;

/// Mode for the CA and client certificate files.
const PUBLIC_FILE_MODE: u32 = 0o644;
/// Mode for the private key.
const KEY_FILE_MODE: u32 = 0o600;

/// Presence of each credential file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub ca: bool,
    pub cert: bool,
    pub key: bool,
}

impl CredentialStatus {
    /// True only when all three files exist.
    #[must_use]
    pub const fn all_present(&self) -> bool {
        self.ca && self.cert && self.key
    }
}

/// Credential files of one certificate directory
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
    paths: CredentialPaths,
}

impl CredentialStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let paths = CredentialPaths::in_dir(&dir);
        Self { dir, paths }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn paths(&self) -> &CredentialPaths {
        &self.paths
    }

    /// Report which credential files exist. An unreadable path counts as
    /// missing.
    pub async fn check(&self) -> CredentialStatus {
        let (ca, cert, key) = tokio::join!(
            fs::try_exists(&self.paths.ca),
            fs::try_exists(&self.paths.cert),
            fs::try_exists(&self.paths.key),
        );
        CredentialStatus {
            ca: ca.unwrap_or(false),
            cert: cert.unwrap_or(false),
            key: key.unwrap_or(false),
        }
    }

    /// Whether all three credential files exist.
    pub async fn all_present(&self) -> bool {
        self.check().await.all_present()
    }

    /// Persist `bundle` on the blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`CredentialStore::persist`], plus a pairing error if the
    /// write task is cancelled or panics.
    pub async fn save(&self, bundle: CredentialBundle) -> Result<CredentialPaths> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.persist(&bundle))
            .await
            .map_err(|e| BridgeError::Pairing {
                reason: format!("Credential write task failed: {e}"),
            })?
    }

    /// Write `bundle` into the directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or any file
    /// cannot be staged or moved into place.
    pub fn persist(&self, bundle: &CredentialBundle) -> Result<CredentialPaths> {
        std::fs::create_dir_all(&self.dir)?;

        let staged = [
            (self.stage(bundle.ca.as_bytes(), PUBLIC_FILE_MODE)?, &self.paths.ca),
            (self.stage(bundle.cert.as_bytes(), PUBLIC_FILE_MODE)?, &self.paths.cert),
            (self.stage(bundle.key.as_bytes(), KEY_FILE_MODE)?, &self.paths.key),
        ];
        debug!(dir = %self.dir.display(), "Credential files staged");

        for (file, target) in staged {
            file.persist(target).map_err(|e| e.error)?;
        }

        info!(dir = %self.dir.display(), "Credential files saved");
        Ok(self.paths.clone())
    }

    fn stage(&self, contents: &[u8], mode: u32) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(".caseta-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        set_mode(file.as_file(), mode)?;
        file.write_all(contents)?;
        file.as_file().sync_all()?;
        Ok(file)
    }
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
