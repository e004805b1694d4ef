//! TLS configuration for LEAP connections.
//!
//! Caseta bridges present certificates issued to their own hostname, which
//! never matches the IP address we dial. The main connection therefore
//! verifies the chain against the bridge CA saved at pairing time but
//! ignores the name. The pairing port presents a certificate we have no CA
//! for yet, so it is not verified at all.

use std::io::BufReader;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::{BridgeError, Result};

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Parse every certificate in a PEM blob.
///
/// # Errors
///
/// Returns a TLS error if the PEM is malformed or holds no certificate.
pub fn parse_certs(pem: &[u8], what: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(pem))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| BridgeError::Tls(format!("Invalid {what}: {e}")))?;
    if certs.is_empty() {
        return Err(BridgeError::Tls(format!("{what} contains no certificates")));
    }
    Ok(certs)
}

/// Parse the first private key in a PEM blob (PKCS#1, PKCS#8 or SEC1).
///
/// # Errors
///
/// Returns a TLS error if no key is found.
pub fn parse_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut BufReader::new(pem))
        .map_err(|e| BridgeError::Tls(format!("Invalid private key: {e}")))?
        .ok_or_else(|| BridgeError::Tls("Private key file contains no key".to_string()))
}

/// Client configuration for the main LEAP port.
///
/// # Errors
///
/// Returns a TLS error if any of the PEM blobs is unusable.
pub fn bridge_client_config(ca_pem: &[u8], cert_pem: &[u8], key_pem: &[u8]) -> Result<ClientConfig> {
    let provider = provider();

    let mut roots = RootCertStore::empty();
    for ca in parse_certs(ca_pem, "bridge CA certificate")? {
        roots.add(ca)?;
    }
    let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
        .build()
        .map_err(|e| BridgeError::Tls(e.to_string()))?;

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(BridgeCertVerifier { inner }))
        .with_client_auth_cert(parse_certs(cert_pem, "client certificate")?, parse_key(key_pem)?)?;
    Ok(config)
}

/// Client configuration for the pairing port, optionally presenting an
/// identity the bridge accepts for pairing.
///
/// # Errors
///
/// Returns a TLS error if the identity is unusable.
pub fn pairing_client_config(identity: Option<(&[u8], &[u8])>) -> Result<ClientConfig> {
    let provider = provider();
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert { provider }));

    let config = match identity {
        Some((cert_pem, key_pem)) => builder.with_client_auth_cert(
            parse_certs(cert_pem, "pairing certificate")?,
            parse_key(key_pem)?,
        )?,
        None => builder.with_no_client_auth(),
    };
    Ok(config)
}

/// Server name for an address; IP literals become IP server names.
///
/// # Errors
///
/// Returns a TLS error if `address` is neither an IP nor a DNS name.
pub fn server_name(address: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(address.to_owned())
        .map_err(|e| BridgeError::Tls(format!("Invalid bridge address {address}: {e}")))
}

/// Chain verification against the bridge CA, ignoring the certificate name.
#[derive(Debug)]
struct BridgeCertVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for BridgeCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Accepts any server certificate; handshake signatures are still checked.
#[derive(Debug)]
struct AcceptAnyCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
