//! LEAP pairing
//!
//! The bridge listens for pairing on a second port. Once connected, it
//! announces `PhysicalAccess` permission after its button is pressed; the
//! client then submits a CSR and receives a signed certificate plus the
//! bridge root CA.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::client::{LEAP_PORT, LeapClient, REQUEST_TIMEOUT, open_tls};
use super::tls;
use crate::config::{PAIRING_CERT_FILE_NAME, PAIRING_KEY_FILE_NAME};
use crate::error::{BridgeError, Result};
use crate::ports::{BridgeClient, CredentialBundle, PairingPrimitive, ReadyNotifier};

/// Pairing port.
pub const PAIRING_PORT: u16 = 8083;
/// How long the bridge button may take to be pressed.
pub const BUTTON_WINDOW: Duration = Duration::from_secs(30);

const CLIENT_NAME: &str = "lutron-caseta-mcp";
const CSR_TAG: &str = "get-cert";

/// Signed material returned by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningResult {
    pub cert: String,
    pub ca: String,
}

/// Generate a fresh key and a CSR for it.
///
/// Returns `(csr_pem, key_pem)`.
///
/// # Errors
///
/// Returns a pairing error if key generation fails.
pub fn generate_csr() -> Result<(String, Zeroizing<String>)> {
    let mut params = CertificateParams::new(Vec::<String>::new());
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, CLIENT_NAME);

    let cert = Certificate::from_params(params).map_err(|e| BridgeError::Pairing {
        reason: format!("Could not generate key: {e}"),
    })?;
    let csr = cert
        .serialize_request_pem()
        .map_err(|e| BridgeError::Pairing {
            reason: format!("Could not generate CSR: {e}"),
        })?;
    Ok((csr, Zeroizing::new(cert.serialize_private_key_pem())))
}

fn csr_request(csr_pem: &str) -> Value {
    json!({
        "Header": {
            "RequestType": "Execute",
            "Url": "/pair",
            "ClientTag": CSR_TAG,
        },
        "Body": {
            "CommandType": "CSR",
            "Parameters": {
                "CSR": csr_pem,
                "DisplayName": CLIENT_NAME,
                "DeviceUID": "000000000000",
                "Role": "Admin",
            }
        }
    })
}

fn has_physical_access(message: &Value) -> bool {
    message
        .pointer("/Body/Status/Permissions")
        .and_then(Value::as_array)
        .is_some_and(|perms| perms.iter().any(|p| p == "PhysicalAccess"))
}

async fn next_message<R>(reader: &mut R) -> Result<Value>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(BridgeError::Pairing {
                reason: "Bridge closed the pairing connection".to_string(),
            });
        }
        match serde_json::from_str(line.trim()) {
            Ok(message) => return Ok(message),
            Err(e) => debug!(error = %e, "Skipping unreadable pairing message"),
        }
    }
}

/// Run the button-press and CSR exchange over an open pairing stream.
///
/// `ready` fires as soon as the exchange starts; the bridge then has
/// `window` to report that its button was pressed.
///
/// # Errors
///
/// Returns a pairing error on timeout, on a closed stream, or if the
/// bridge rejects the CSR.
pub async fn exchange<S>(
    stream: S,
    ready: ReadyNotifier,
    window: Duration,
    csr_pem: &str,
) -> Result<SigningResult>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    ready.notify();

    let deadline = Instant::now() + window;
    let wait_for_button = async {
        loop {
            let message = next_message(&mut stream).await?;
            if has_physical_access(&message) {
                return Ok::<_, BridgeError>(());
            }
        }
    };
    timeout_at(deadline, wait_for_button)
        .await
        .map_err(|_| BridgeError::Pairing {
            reason: format!(
                "Bridge button was not pressed within {} seconds",
                window.as_secs()
            ),
        })??;
    info!("Bridge button press confirmed");

    let mut line = csr_request(csr_pem).to_string();
    line.push('\n');
    stream.write_all(line.as_bytes()).await?;
    stream.flush().await?;

    let read_signing = async {
        loop {
            let message = next_message(&mut stream).await?;
            if message.pointer("/Header/ClientTag").and_then(Value::as_str) == Some(CSR_TAG) {
                return Ok::<_, BridgeError>(message);
            }
        }
    };
    let response = timeout_at(Instant::now() + REQUEST_TIMEOUT, read_signing)
        .await
        .map_err(|_| BridgeError::Timeout {
            seconds: REQUEST_TIMEOUT.as_secs(),
        })??;

    let field = |name: &str| {
        response
            .pointer(&format!("/Body/SigningResult/{name}"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    match (field("Certificate"), field("RootCertificate")) {
        (Some(cert), Some(ca)) => Ok(SigningResult { cert, ca }),
        _ => Err(BridgeError::Pairing {
            reason: format!(
                "Bridge rejected the certificate request ({})",
                response
                    .pointer("/Header/StatusCode")
                    .and_then(Value::as_str)
                    .unwrap_or("no status")
            ),
        }),
    }
}

/// Pairing primitive talking to a real bridge.
#[derive(Debug, Clone, Default)]
pub struct LeapPairing {
    identity_dir: Option<PathBuf>,
}

impl LeapPairing {
    #[must_use]
    pub const fn new(identity_dir: Option<PathBuf>) -> Self {
        Self { identity_dir }
    }

    /// Client identity for the pairing port, if one is configured and
    /// both files exist.
    async fn identity(&self) -> Result<Option<(Vec<u8>, Zeroizing<Vec<u8>>)>> {
        let Some(dir) = &self.identity_dir else {
            return Ok(None);
        };
        let cert_path = dir.join(PAIRING_CERT_FILE_NAME);
        let key_path = dir.join(PAIRING_KEY_FILE_NAME);
        if !cert_path.is_file() || !key_path.is_file() {
            warn!(dir = %dir.display(), "Pairing identity directory is incomplete, ignoring it");
            return Ok(None);
        }
        let cert = tokio::fs::read(&cert_path).await?;
        let key = Zeroizing::new(tokio::fs::read(&key_path).await?);
        Ok(Some((cert, key)))
    }

    async fn read_version(address: &str, signed: &SigningResult, key: &str) -> Result<String> {
        let config = tls::bridge_client_config(
            signed.ca.as_bytes(),
            signed.cert.as_bytes(),
            key.as_bytes(),
        )?;
        let client = LeapClient::new(address, open_tls(address, LEAP_PORT, config).await?);
        let version = client.protocol_version().await;
        if let Err(e) = client.close().await {
            debug!(error = %e, "Error closing version probe session");
        }
        version
    }
}

#[async_trait]
impl PairingPrimitive for LeapPairing {
    async fn pair(&self, address: &str, ready: ReadyNotifier) -> Result<CredentialBundle> {
        let (csr, key) = generate_csr()?;

        let identity = self.identity().await?;
        let config = tls::pairing_client_config(
            identity
                .as_ref()
                .map(|(cert, id_key)| (cert.as_slice(), id_key.as_slice())),
        )?;

        let stream = open_tls(address, PAIRING_PORT, config).await?;
        debug!(address, port = PAIRING_PORT, "Pairing session open");
        let signed = exchange(stream, ready, BUTTON_WINDOW, &csr).await?;

        let version = Self::read_version(address, &signed, &key).await?;
        Ok(CredentialBundle {
            ca: signed.ca,
            cert: signed.cert,
            key,
            version,
        })
    }
}
