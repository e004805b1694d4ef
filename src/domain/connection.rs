//! Connection Manager
//!
//! Two-state machine (Disconnected, Connected) around one bridge session.
//! Device operations refuse to run unless connected. A session the client
//! reports as no longer open is reopened before the next operation; if that
//! fails the broken session stays in place and the operation fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{error, info, warn};

use super::device::{Device, DeviceDomain};
use crate::error::{BridgeError, Result};
use crate::ports::{BridgeClient, BridgeConnector, BridgeTarget};
use crate::security::validate_level_value;

enum ConnectionState {
    Disconnected,
    Connected {
        client: Box<dyn BridgeClient>,
        since: DateTime<Utc>,
    },
}

/// Owns the lifecycle of a single connection to one bridge.
pub struct ConnectionManager {
    target: BridgeTarget,
    connector: Arc<dyn BridgeConnector>,
    state: RwLock<ConnectionState>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(target: BridgeTarget, connector: Arc<dyn BridgeConnector>) -> Self {
        Self {
            target,
            connector,
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    #[must_use]
    pub const fn target(&self) -> &BridgeTarget {
        &self.target
    }

    /// Connect to the bridge. Returns whether the manager is now connected.
    ///
    /// Failures are logged and reported as `false`. Connecting while
    /// already connected keeps the existing session.
    pub async fn connect(&self) -> bool {
        let mut state = self.state.write().await;
        if matches!(*state, ConnectionState::Connected { .. }) {
            return true;
        }

        match self.connector.connect(&self.target).await {
            Ok(client) => {
                info!(address = %self.target.address, "Connected to Lutron Caseta bridge");
                *state = ConnectionState::Connected {
                    client,
                    since: Utc::now(),
                };
                true
            }
            Err(e) => {
                error!(
                    address = %self.target.address,
                    error = %e,
                    "Failed to connect to Lutron Caseta bridge"
                );
                false
            }
        }
    }

    /// Close the session if there is one. Calling it again is a no-op.
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        let previous = std::mem::replace(&mut *state, ConnectionState::Disconnected);
        if let ConnectionState::Connected { client, .. } = previous {
            if let Err(e) = client.close().await {
                warn!(address = %self.target.address, error = %e, "Error while closing bridge session");
            }
            info!(address = %self.target.address, "Disconnected from Lutron Caseta bridge");
        }
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.read().await, ConnectionState::Connected { .. })
    }

    /// When the current session was established.
    pub async fn connected_since(&self) -> Option<DateTime<Utc>> {
        match &*self.state.read().await {
            ConnectionState::Connected { since, .. } => Some(*since),
            ConnectionState::Disconnected => None,
        }
    }

    /// Devices in `domain`; empty when the bridge reports none.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotConnected`] when disconnected, or the
    /// bridge error if the listing fails.
    pub async fn devices_by_domain(&self, domain: DeviceDomain) -> Result<Vec<Device>> {
        let state = self.live_state().await;
        let client = connected_client(&state)?;
        Ok(client.devices_by_domain(domain).await?.unwrap_or_default())
    }

    /// Turn a device on. Bridge failures are logged and reported as `false`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotConnected`] when disconnected.
    pub async fn turn_on(&self, device_id: &str) -> Result<bool> {
        let state = self.live_state().await;
        let client = connected_client(&state)?;
        Ok(report(client.turn_on(device_id).await, "turn on", device_id))
    }

    /// Turn a device off. Bridge failures are logged and reported as `false`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotConnected`] when disconnected.
    pub async fn turn_off(&self, device_id: &str) -> Result<bool> {
        let state = self.live_state().await;
        let client = connected_client(&state)?;
        Ok(report(client.turn_off(device_id).await, "turn off", device_id))
    }

    /// Set a device level in percent.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotConnected`] when disconnected and a
    /// validation error when `level` is outside `0..=100`; neither reaches
    /// the bridge.
    pub async fn set_level(&self, device_id: &str, level: i64) -> Result<bool> {
        let state = self.live_state().await;
        let client = connected_client(&state)?;

        let value = validate_level_value(level)?;

        Ok(report(
            client.set_value(device_id, value).await,
            "set value for",
            device_id,
        ))
    }

    /// Read access to the state, reopening a broken session first.
    async fn live_state(&self) -> RwLockReadGuard<'_, ConnectionState> {
        let broken = matches!(
            &*self.state.read().await,
            ConnectionState::Connected { client, .. } if !client.is_open()
        );
        if broken {
            self.reopen().await;
        }
        self.state.read().await
    }

    async fn reopen(&self) {
        let mut state = self.state.write().await;
        // Another caller may have reopened it while we waited.
        let ConnectionState::Connected { client, .. } = &*state else {
            return;
        };
        if client.is_open() {
            return;
        }

        warn!(address = %self.target.address, "Bridge session broken, reconnecting");
        match self.connector.connect(&self.target).await {
            Ok(client) => {
                *state = ConnectionState::Connected {
                    client,
                    since: Utc::now(),
                };
                info!(address = %self.target.address, "Reconnected to Lutron Caseta bridge");
            }
            Err(e) => {
                error!(address = %self.target.address, error = %e, "Reconnect failed");
            }
        }
    }
}

fn connected_client(state: &ConnectionState) -> Result<&dyn BridgeClient> {
    match state {
        ConnectionState::Connected { client, .. } => Ok(client.as_ref()),
        ConnectionState::Disconnected => Err(BridgeError::NotConnected),
    }
}

fn report(outcome: Result<()>, action: &str, device_id: &str) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            error!(device_id = %device_id, error = %e, "Failed to {action} device");
            false
        }
    }
}
