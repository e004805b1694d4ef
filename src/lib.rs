#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod leap;
pub mod mcp;
pub mod ports;
pub mod security;

pub use config::BridgeConfig;
pub use domain::{BridgeSession, ConnectionManager, PairingFlow, PairingResult};
pub use error::{BridgeError, Result};
pub use leap::{LeapConnector, LeapPairing};
pub use mcp::McpServer;
pub use ports::{ToolAnnotations, ToolContext, ToolHandler, ToolSchema};

// Re-exports for fuzzing
#[doc(hidden)]
pub use mcp::protocol::{JsonRpcRequest, ToolCallParams};
#[doc(hidden)]
pub use security::{validate_device_level, validate_domain, validate_host_ip};
