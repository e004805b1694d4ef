//! Ports module - Trait definitions for hexagonal architecture
//!
//! This module contains the trait definitions (ports) that define
//! the boundaries between the domain logic and external adapters.

pub mod bridge;
pub mod protocol;
mod tools;

pub use bridge::{
    BridgeClient, BridgeConnector, BridgeTarget, CredentialBundle, DEFAULT_READY_PROMPT,
    PairingPrimitive, ReadyNotifier,
};
pub use protocol::{ClientLog, LogLevel, ToolAnnotations, ToolCallResult, ToolContent};
pub use tools::{ToolContext, ToolHandler, ToolSchema};

#[cfg(test)]
pub use bridge::mock::{MockBridgeClient, MockBridgeConnector, MockPairing};

#[cfg(test)]
pub use tools::mock;
