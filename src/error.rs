use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    // Input validation errors
    #[error("{0}")]
    Validation(String),

    // Connection state errors
    #[error("Not connected to Lutron Caseta bridge. Use pair_bridge tool first.")]
    NotConnected,

    // Bridge errors
    #[error("Connection to bridge {address} failed: {reason}")]
    Connection { address: String, reason: String },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Bridge request failed: {reason}")]
    Bridge { reason: String },

    #[error("Bridge did not respond within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Unknown device: {device_id}")]
    UnknownDevice { device_id: String },

    // Pairing errors
    #[error("{reason}")]
    Pairing { reason: String },

    #[error("A pairing attempt is already in progress")]
    PairingInProgress,

    // MCP protocol errors
    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    #[error("MCP invalid request: {0}")]
    McpInvalidRequest(String),

    #[error("MCP missing parameter: {param}")]
    McpMissingParam { param: String },

    #[error("MCP unknown tool: {tool}")]
    McpUnknownTool { tool: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable tag telling callers which class of failure this is.
    ///
    /// A `validation` error means the request was malformed; `not_connected`
    /// means it was well-formed but the bridge has not been paired or
    /// connected yet.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotConnected => "not_connected",
            Self::Connection { .. }
            | Self::Tls(_)
            | Self::Bridge { .. }
            | Self::Timeout { .. }
            | Self::UnknownDevice { .. }
            | Self::Pairing { .. }
            | Self::PairingInProgress => "external",
            Self::McpProtocol(_)
            | Self::McpInvalidRequest(_)
            | Self::McpMissingParam { .. }
            | Self::McpUnknownTool { .. } => "protocol",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }

    /// Whether this is an input validation failure.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<rustls::Error> for BridgeError {
    fn from(e: rustls::Error) -> Self {
        Self::Tls(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
