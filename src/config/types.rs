use std::path::{Path, PathBuf};

use serde::Serialize;

/// Environment variable holding the bridge IP address.
pub const ENV_BRIDGE_ADDRESS: &str = "BRIDGE_ADDRESS";
/// Environment variable overriding the certificate directory.
pub const ENV_CERT_DIRECTORY: &str = "CERT_DIRECTORY";
/// Older names still honored when the primary ones are unset.
pub const LEGACY_ENV_BRIDGE_ADDRESS: &str = "LUTRON_BRIDGE_IP";
pub const LEGACY_ENV_CERT_DIRECTORY: &str = "LUTRON_CERT_DIR";
/// Directory holding `pairing.crt` / `pairing.key` for the pairing port.
pub const ENV_PAIRING_IDENTITY_DIR: &str = "PAIRING_IDENTITY_DIR";

/// Directory name under the user config home.
pub const APP_DIR_NAME: &str = "lutron-caseta-mcp";

pub const CA_FILE_NAME: &str = "caseta-bridge.crt";
pub const CERT_FILE_NAME: &str = "caseta.crt";
pub const KEY_FILE_NAME: &str = "caseta.key";

pub const PAIRING_CERT_FILE_NAME: &str = "pairing.crt";
pub const PAIRING_KEY_FILE_NAME: &str = "pairing.key";

/// Paths of the three credential files inside a certificate directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialPaths {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl CredentialPaths {
    /// Derive the fixed file paths for `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            ca: dir.join(CA_FILE_NAME),
            cert: dir.join(CERT_FILE_NAME),
            key: dir.join(KEY_FILE_NAME),
        }
    }
}

/// Runtime configuration of the gateway.
///
/// The certificate directory is always known (it falls back to a default);
/// the bridge address is absent until the bridge has been paired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub bridge_address: Option<String>,
    pub cert_dir: PathBuf,
    pub credentials: CredentialPaths,
}

impl BridgeConfig {
    #[must_use]
    pub fn new(bridge_address: Option<String>, cert_dir: PathBuf) -> Self {
        let credentials = CredentialPaths::in_dir(&cert_dir);
        Self {
            bridge_address,
            cert_dir,
            credentials,
        }
    }

    /// Point the configuration at a different bridge.
    pub fn set_bridge_address(&mut self, address: impl Into<String>) {
        self.bridge_address = Some(address.into());
    }
}
