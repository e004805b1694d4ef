//! Device Tool Handler
//!
//! Generic handler for the tools that send a single command to one device
//! (turn on, turn off, set level). Each tool defines its args struct, how
//! the args become a [`DeviceCommand`], and which manager call applies it.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::domain::ConnectionManager;
use crate::error::{BridgeError, Result};
use crate::mcp::protocol::ToolCallResult;
use crate::ports::{ToolContext, ToolHandler, ToolSchema};

/// Validated command for a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub device_id: String,
    pub level: Option<u8>,
}

impl DeviceCommand {
    #[must_use]
    pub const fn new(device_id: String) -> Self {
        Self {
            device_id,
            level: None,
        }
    }

    #[must_use]
    pub const fn with_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }
}

/// Trait for tools that follow the device command pipeline.
///
/// The pipeline is: parse args → validate into a command → require an
/// active connection → apply → report `{device_id, action, success}`.
#[async_trait]
pub trait DeviceTool: Send + Sync + 'static {
    /// The deserialized arguments type.
    type Args: DeserializeOwned + Send;

    /// Tool name (used for routing and logging).
    const NAME: &'static str;
    /// Tool description shown to MCP clients.
    const DESCRIPTION: &'static str;
    /// JSON schema string for the tool's input.
    const SCHEMA: &'static str;
    /// Action label echoed in the result.
    const ACTION: &'static str;

    /// Validate raw arguments. Runs before the connection is looked at.
    fn prepare(args: Self::Args) -> Result<DeviceCommand>;

    /// Send the command to the bridge.
    async fn apply(manager: &ConnectionManager, command: &DeviceCommand) -> Result<bool>;
}

/// Generic handler that wraps a [`DeviceTool`] and implements [`ToolHandler`].
pub struct DeviceToolHandler<T: DeviceTool>(PhantomData<T>);

impl<T: DeviceTool> Default for DeviceToolHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeviceTool> DeviceToolHandler<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

/// Parse tool arguments, reporting absent arguments as a missing param.
///
/// # Errors
///
/// Returns [`BridgeError::McpMissingParam`] when `args` is `None` and
/// [`BridgeError::McpInvalidRequest`] when it does not match `A`.
pub fn parse_args<A: DeserializeOwned>(args: Option<Value>) -> Result<A> {
    let Some(v) = args else {
        return Err(BridgeError::McpMissingParam {
            param: "arguments".to_string(),
        });
    };
    serde_json::from_value(v).map_err(|e| BridgeError::McpInvalidRequest(e.to_string()))
}

/// The active connection manager, if the session is connected.
///
/// # Errors
///
/// Returns [`BridgeError::NotConnected`] otherwise.
pub async fn connected_manager(ctx: &ToolContext) -> Result<Arc<ConnectionManager>> {
    if !ctx.session.is_connected() {
        return Err(BridgeError::NotConnected);
    }
    ctx.session.manager().await
}

#[async_trait]
impl<T: DeviceTool> ToolHandler for DeviceToolHandler<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn description(&self) -> &'static str {
        T::DESCRIPTION
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: T::NAME,
            description: T::DESCRIPTION,
            input_schema: T::SCHEMA,
        }
    }

    async fn execute(&self, args: Option<Value>, ctx: &ToolContext) -> Result<ToolCallResult> {
        let args: T::Args = parse_args(args)?;
        let command = T::prepare(args)?;
        let manager = connected_manager(ctx).await?;

        info!(tool = T::NAME, device_id = %command.device_id, "Sending device command");
        let success = T::apply(&manager, &command).await?;
        if !success {
            warn!(tool = T::NAME, device_id = %command.device_id, "Bridge rejected device command");
        }

        let mut report = json!({
            "device_id": command.device_id,
            "action": T::ACTION,
        });
        if let Some(level) = command.level {
            report["level"] = json!(level);
        }
        report["success"] = json!(success);
        Ok(ToolCallResult::json(report))
    }
}
