//! Bridge Session
//!
//! Process-wide state of the gateway: current configuration, the active
//! [`ConnectionManager`] and the connected flag. One session is created at
//! start-up, shared by handle with every tool call, and cleaned up on
//! shutdown. Re-pairing swaps the manager in a single write.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::connection::ConnectionManager;
use super::credentials::{CredentialStatus, CredentialStore};
use super::pairing::PairingFlow;
use crate::config::{BridgeConfig, ENV_BRIDGE_ADDRESS, env_lookup, load_config_from};
use crate::error::{BridgeError, Result};
use crate::ports::{BridgeConnector, BridgeTarget, PairingPrimitive};

/// Environment variable lookup used to build configuration.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Snapshot reported by the status tool and CLI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub bridge_ip: Option<String>,
    pub cert_dir: PathBuf,
    pub certificates: CredentialStatus,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_since: Option<DateTime<Utc>>,
}

pub struct BridgeSession {
    config: RwLock<Option<BridgeConfig>>,
    manager: RwLock<Option<Arc<ConnectionManager>>>,
    connected: AtomicBool,
    connector: Arc<dyn BridgeConnector>,
    pairing: PairingFlow,
    env: EnvLookup,
}

impl BridgeSession {
    /// Create a session reading configuration from the process environment.
    #[must_use]
    pub fn new(connector: Arc<dyn BridgeConnector>, pairing: Arc<dyn PairingPrimitive>) -> Self {
        Self::with_env(connector, pairing, Arc::new(env_lookup))
    }

    /// Create a session with an explicit environment lookup.
    #[must_use]
    pub fn with_env(
        connector: Arc<dyn BridgeConnector>,
        pairing: Arc<dyn PairingPrimitive>,
        env: EnvLookup,
    ) -> Self {
        Self {
            config: RwLock::new(None),
            manager: RwLock::new(None),
            connected: AtomicBool::new(false),
            connector,
            pairing: PairingFlow::new(pairing),
            env,
        }
    }

    fn load_config(&self) -> BridgeConfig {
        let env = Arc::clone(&self.env);
        load_config_from(move |name| env(name))
    }

    /// Load configuration and connect if the bridge is already paired.
    ///
    /// Missing configuration or credentials is the normal unpaired state:
    /// it is logged and reported as `false` without attempting a connection.
    pub async fn initialize(&self) -> bool {
        let config = self.load_config();
        *self.config.write().await = Some(config.clone());

        let Some(address) = config.bridge_address.clone() else {
            warn!("{ENV_BRIDGE_ADDRESS} not set. Use pair_bridge tool to configure.");
            return false;
        };

        let store = CredentialStore::new(&config.cert_dir);
        if !store.all_present().await {
            warn!(
                cert_dir = %config.cert_dir.display(),
                "Certificate files not found. Use pair_bridge tool to pair with bridge."
            );
            return false;
        }

        let manager = Arc::new(ConnectionManager::new(
            BridgeTarget {
                address,
                credentials: config.credentials.clone(),
            },
            Arc::clone(&self.connector),
        ));
        let connected = manager.connect().await;
        let previous = self.manager.write().await.replace(manager);
        self.connected.store(connected, Ordering::SeqCst);

        if let Some(previous) = previous {
            previous.disconnect().await;
        }
        connected
    }

    /// Disconnect the active manager, if any. Safe to call repeatedly.
    pub async fn cleanup(&self) {
        let manager = self.manager.write().await.take();
        if let Some(manager) = manager {
            manager.disconnect().await;
            info!("Session cleaned up");
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Point the configuration at `address`, loading it from the
    /// environment first if none exists yet.
    pub async fn update_config(&self, address: &str) -> BridgeConfig {
        let mut slot = self.config.write().await;
        let config = slot.get_or_insert_with(|| self.load_config());
        config.set_bridge_address(address);
        config.clone()
    }

    /// Switch to the bridge at `address` after a successful pairing.
    ///
    /// The new manager is connected before it replaces the old one; the old
    /// manager is disconnected after the swap. Returns the new connected
    /// flag.
    pub async fn activate(&self, address: &str) -> bool {
        let config = self.update_config(address).await;
        let manager = Arc::new(ConnectionManager::new(
            BridgeTarget {
                address: address.to_string(),
                credentials: config.credentials,
            },
            Arc::clone(&self.connector),
        ));
        let connected = manager.connect().await;

        let previous = self.manager.write().await.replace(manager);
        self.connected.store(connected, Ordering::SeqCst);

        if let Some(previous) = previous {
            previous.disconnect().await;
        }
        info!(address = %address, connected, "Active bridge replaced");
        connected
    }

    /// The active connection manager.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotConnected`] if no bridge has been set up.
    pub async fn manager(&self) -> Result<Arc<ConnectionManager>> {
        self.manager
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(BridgeError::NotConnected)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Current configuration, loading it from the environment if the
    /// session has not been initialized.
    pub async fn config(&self) -> BridgeConfig {
        match &*self.config.read().await {
            Some(config) => config.clone(),
            None => self.load_config(),
        }
    }

    #[must_use]
    pub const fn pairing(&self) -> &PairingFlow {
        &self.pairing
    }

    pub async fn status(&self) -> SessionStatus {
        let config = self.config().await;
        let connected_since = match self.manager().await {
            Ok(manager) => manager.connected_since().await,
            Err(_) => None,
        };
        let certificates = CredentialStore::new(&config.cert_dir).check().await;
        SessionStatus {
            bridge_ip: config.bridge_address,
            certificates,
            cert_dir: config.cert_dir,
            connected: self.is_connected(),
            connected_since,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::bridge::mock::{MockBridgeConnector, MockPairing};
    use std::collections::HashMap;

    fn env_from(vars: &[(&str, &str)]) -> EnvLookup {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Arc::new(move |name: &str| map.get(name).cloned())
    }

    fn write_credentials(dir: &std::path::Path) {
        for name in ["caseta-bridge.crt", "caseta.crt", "caseta.key"] {
            std::fs::write(dir.join(name), name).unwrap();
        }
    }

    fn session(env: EnvLookup) -> (BridgeSession, Arc<MockBridgeConnector>) {
        let connector = Arc::new(MockBridgeConnector::new());
        let session = BridgeSession::with_env(
            connector.clone(),
            Arc::new(MockPairing::succeeding()),
            env,
        );
        (session, connector)
    }

    #[tokio::test]
    async fn test_initialize_without_address_does_not_connect() {
        let (session, connector) = session(env_from(&[]));
        assert!(!session.initialize().await);
        assert!(!session.is_connected());
        assert!(connector.connect_calls().is_empty());
        assert!(matches!(session.manager().await, Err(BridgeError::NotConnected)));
    }

    #[tokio::test]
    async fn test_initialize_without_credentials_does_not_connect() {
        let tmp = tempfile::tempdir().unwrap();
        let (session, connector) = session(env_from(&[
            ("BRIDGE_ADDRESS", "192.168.1.50"),
            ("CERT_DIRECTORY", tmp.path().to_str().unwrap()),
        ]));
        assert!(!session.initialize().await);
        assert!(connector.connect_calls().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_connects_when_paired() {
        let tmp = tempfile::tempdir().unwrap();
        write_credentials(tmp.path());
        let (session, connector) = session(env_from(&[
            ("BRIDGE_ADDRESS", "192.168.1.50"),
            ("CERT_DIRECTORY", tmp.path().to_str().unwrap()),
        ]));

        assert!(session.initialize().await);
        assert!(session.is_connected());
        let calls = connector.connect_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].address, "192.168.1.50");
    }

    #[tokio::test]
    async fn test_initialize_reports_connect_failure() {
        let tmp = tempfile::tempdir().unwrap();
        write_credentials(tmp.path());
        let (session, connector) = session(env_from(&[
            ("BRIDGE_ADDRESS", "192.168.1.50"),
            ("CERT_DIRECTORY", tmp.path().to_str().unwrap()),
        ]));
        connector.fail_connect("refused");

        assert!(!session.initialize().await);
        assert!(!session.is_connected());
        assert!(session.manager().await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        write_credentials(tmp.path());
        let (session, connector) = session(env_from(&[
            ("BRIDGE_ADDRESS", "192.168.1.50"),
            ("CERT_DIRECTORY", tmp.path().to_str().unwrap()),
        ]));
        session.initialize().await;

        session.cleanup().await;
        session.cleanup().await;

        assert!(!session.is_connected());
        assert_eq!(connector.state.close_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_config_loads_env_then_overrides_address() {
        let tmp = tempfile::tempdir().unwrap();
        let (session, _) = session(env_from(&[
            ("BRIDGE_ADDRESS", "10.0.0.1"),
            ("CERT_DIRECTORY", tmp.path().to_str().unwrap()),
        ]));

        let config = session.update_config("10.0.0.2").await;

        assert_eq!(config.bridge_address.as_deref(), Some("10.0.0.2"));
        assert!(config.cert_dir.starts_with(tmp.path().canonicalize().unwrap()));
        assert_eq!(
            session.config().await.bridge_address.as_deref(),
            Some("10.0.0.2")
        );
    }

    #[tokio::test]
    async fn test_activate_replaces_manager_and_closes_old() {
        let tmp = tempfile::tempdir().unwrap();
        write_credentials(tmp.path());
        let (session, connector) = session(env_from(&[
            ("BRIDGE_ADDRESS", "10.0.0.1"),
            ("CERT_DIRECTORY", tmp.path().to_str().unwrap()),
        ]));
        session.initialize().await;
        let old = session.manager().await.unwrap();

        assert!(session.activate("10.0.0.2").await);

        let current = session.manager().await.unwrap();
        assert_eq!(current.target().address, "10.0.0.2");
        assert!(!old.is_connected().await);
        assert!(current.is_connected().await);
        assert_eq!(connector.connect_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_reinitialize_keeps_one_live_connection() {
        let tmp = tempfile::tempdir().unwrap();
        write_credentials(tmp.path());
        let (session, connector) = session(env_from(&[
            ("BRIDGE_ADDRESS", "10.0.0.1"),
            ("CERT_DIRECTORY", tmp.path().to_str().unwrap()),
        ]));

        assert!(session.initialize().await);
        let first = session.manager().await.unwrap();
        assert!(session.initialize().await);
        let second = session.manager().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!first.is_connected().await);
        assert!(second.is_connected().await);
        assert_eq!(connector.connect_calls().len(), 2);
        assert_eq!(connector.state.close_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_activate_then_cleanup_closes_every_session() {
        let tmp = tempfile::tempdir().unwrap();
        write_credentials(tmp.path());
        let (session, connector) = session(env_from(&[
            ("BRIDGE_ADDRESS", "10.0.0.1"),
            ("CERT_DIRECTORY", tmp.path().to_str().unwrap()),
        ]));
        session.initialize().await;
        session.activate("10.0.0.2").await;
        session.activate("10.0.0.3").await;
        session.cleanup().await;

        assert_eq!(connector.connect_calls().len(), 3);
        assert_eq!(connector.state.close_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_status_reports_presence_and_flag() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("caseta-bridge.crt"), "ca").unwrap();
        let (session, _) = session(env_from(&[
            ("BRIDGE_ADDRESS", "10.0.0.1"),
            ("CERT_DIRECTORY", tmp.path().to_str().unwrap()),
        ]));

        let status = session.status().await;

        assert_eq!(status.bridge_ip.as_deref(), Some("10.0.0.1"));
        assert!(status.certificates.ca);
        assert!(!status.certificates.cert);
        assert!(!status.connected);
        assert!(status.connected_since.is_none());
    }
}
