//! Tool Handler Port
//!
//! This module defines the trait for MCP tool handlers,
//! enabling a plugin-like architecture where each tool
//! can be implemented independently.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::protocol::{ClientLog, ToolCallResult};
use crate::domain::BridgeSession;
use crate::error::Result;

/// Schema definition for a tool
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: &'static str,
}

/// Context provided to tool handlers during execution
pub struct ToolContext {
    pub session: Arc<BridgeSession>,
    /// Channel for log messages shown to the client while a tool runs.
    pub client_log: Option<mpsc::Sender<ClientLog>>,
}

impl ToolContext {
    #[must_use]
    pub const fn new(session: Arc<BridgeSession>) -> Self {
        Self {
            session,
            client_log: None,
        }
    }

    #[must_use]
    pub fn with_client_log(mut self, tx: mpsc::Sender<ClientLog>) -> Self {
        self.client_log = Some(tx);
        self
    }
}

/// Trait for tool handlers
///
/// Each tool in the MCP server implements this trait, providing
/// a consistent interface for tool registration and execution.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Get the tool's name (used for routing)
    fn name(&self) -> &'static str;

    /// Get the tool's description
    fn description(&self) -> &'static str;

    /// Get the tool's input schema as a JSON string
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with the given arguments
    async fn execute(&self, args: Option<Value>, ctx: &ToolContext) -> Result<ToolCallResult>;
}
