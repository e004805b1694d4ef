//! LEAP Adapter
//!
//! Concrete implementation of the bridge ports over the Caseta bridge's
//! TLS line protocol.

mod client;
mod pairing;
pub mod protocol;
mod tls;

pub use client::{CONNECT_TIMEOUT, LEAP_PORT, LeapClient, LeapConnector, REQUEST_TIMEOUT, open_tls};
pub use pairing::{BUTTON_WINDOW, LeapPairing, PAIRING_PORT, SigningResult, exchange, generate_csr};
pub use tls::{bridge_client_config, pairing_client_config};
