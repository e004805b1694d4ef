//! Check Connection Tool Handler
//!
//! Reports the configured bridge, the credential files and whether a
//! session is currently open.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::mcp::protocol::ToolCallResult;
use crate::ports::{ToolContext, ToolHandler, ToolSchema};

/// Connection status tool handler
#[derive(Default)]
pub struct CheckConnectionHandler;

impl CheckConnectionHandler {
    const SCHEMA: &'static str = r#"{
        "type": "object",
        "properties": {},
        "required": []
    }"#;
}

#[async_trait]
impl ToolHandler for CheckConnectionHandler {
    fn name(&self) -> &'static str {
        "check_connection"
    }

    fn description(&self) -> &'static str {
        "Check the connection to the Lutron Caseta bridge. Returns the configured bridge IP, \
         the certificate directory, which of the three certificate files exist, and whether \
         the server is connected. Call this first to find out if pairing is needed."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name(),
            description: self.description(),
            input_schema: Self::SCHEMA,
        }
    }

    async fn execute(&self, _args: Option<Value>, ctx: &ToolContext) -> Result<ToolCallResult> {
        let status = ctx.session.status().await;
        Ok(ToolCallResult::json(serde_json::to_value(status)?))
    }
}
