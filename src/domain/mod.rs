//! Domain module - Core business logic
//!
//! Pairing, credential persistence and the connection lifecycle of the
//! Lutron Caseta gateway.

pub mod connection;
pub mod credentials;
pub mod device;
pub mod pairing;
pub mod session;

pub use connection::ConnectionManager;
pub use credentials::{CredentialStatus, CredentialStore};
pub use device::{Device, DeviceDomain};
pub use pairing::{PairingArtifacts, PairingFlow, PairingResult};
pub use session::{BridgeSession, EnvLookup, SessionStatus};
