//! Tool Registry
//!
//! This module provides a registry for tool handlers, enabling
//! dynamic registration and lookup of tools at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::error::{BridgeError, Result};
use crate::mcp::protocol::{Tool, ToolAnnotations, ToolCallResult};
use crate::ports::{ToolContext, ToolHandler};

/// Registry for tool handlers
///
/// The registry maintains a collection of tool handlers and provides
/// methods for registering, looking up, and listing available tools.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a tool handler
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.name().to_string();
        self.handlers.insert(name, handler);
    }

    /// Get a tool handler by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.get(name)
    }

    /// Execute a tool by name
    ///
    /// # Errors
    ///
    /// Returns an error if the tool is not found or if the tool execution fails.
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Option<serde_json::Value>,
        ctx: &ToolContext,
    ) -> Result<ToolCallResult> {
        let handler = self
            .get(tool_name)
            .ok_or_else(|| BridgeError::McpUnknownTool {
                tool: tool_name.to_string(),
            })?;

        handler.execute(args, ctx).await
    }

    /// Get all registered tools as MCP Tool definitions, sorted by name
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self
            .handlers
            .values()
            .map(|handler| {
                let schema = handler.schema();
                let annotations = tool_annotations(schema.name);
                Tool {
                    name: schema.name.to_string(),
                    description: schema.description.to_string(),
                    input_schema: serde_json::from_str(schema.input_schema)
                        .unwrap_or_else(|_| json!({})),
                    annotations: if annotations.is_empty() {
                        None
                    } else {
                        Some(annotations)
                    },
                }
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Get the number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Behavioral hints for each tool.
#[must_use]
pub fn tool_annotations(tool_name: &str) -> ToolAnnotations {
    match tool_name {
        "check_connection" => ToolAnnotations::read_only("Check Bridge Connection"),
        "list_devices" => ToolAnnotations::read_only("List Devices"),
        "turn_on_device" => ToolAnnotations::idempotent("Turn On Device"),
        "turn_off_device" => ToolAnnotations::idempotent("Turn Off Device"),
        "set_device_level" => ToolAnnotations::idempotent("Set Device Level"),
        "pair_bridge" => ToolAnnotations::mutating("Pair Bridge"),
        _ => ToolAnnotations::default(),
    }
}

/// Create a registry with every tool registered.
#[must_use]
pub fn create_default_registry() -> ToolRegistry {
    use super::device_tool::DeviceToolHandler;
    use super::tool_handlers::{
        CheckConnectionHandler, ListDevicesHandler, PairBridgeHandler, SetDeviceLevelTool,
        TurnOffDeviceTool, TurnOnDeviceTool,
    };

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(PairBridgeHandler));
    registry.register(Arc::new(CheckConnectionHandler));
    registry.register(Arc::new(ListDevicesHandler));
    registry.register(Arc::new(DeviceToolHandler::<TurnOnDeviceTool>::new()));
    registry.register(Arc::new(DeviceToolHandler::<TurnOffDeviceTool>::new()));
    registry.register(Arc::new(DeviceToolHandler::<SetDeviceLevelTool>::new()));
    registry
}
