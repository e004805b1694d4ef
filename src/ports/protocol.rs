//! MCP Protocol Contract Types
//!
//! These types appear in the `ToolHandler` port signature, so they live in
//! the ports layer. `crate::mcp::protocol` re-exports them.

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::BridgeError;

// ============================================================================
// Tool Annotations (MCP 2025-03-26+)
// ============================================================================

/// MCP Tool Annotations providing behavioral hints to clients.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    /// Human-readable title for display in UIs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// If true, the tool does not modify its environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,

    /// If true, the tool may perform destructive operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,

    /// If true, repeating the call with the same args has no further effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,

    /// If true, the tool talks to something beyond the MCP server's host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

impl ToolAnnotations {
    /// Read-only tool: safe for parallel execution, no confirmation needed.
    #[must_use]
    pub fn read_only(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            read_only_hint: Some(true),
            destructive_hint: Some(false),
            idempotent_hint: Some(true),
            open_world_hint: Some(true),
        }
    }

    /// Device command that can be repeated safely (on, off, set level).
    #[must_use]
    pub fn idempotent(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            read_only_hint: Some(false),
            destructive_hint: Some(false),
            idempotent_hint: Some(true),
            open_world_hint: Some(true),
        }
    }

    /// Mutating but non-destructive tool.
    #[must_use]
    pub fn mutating(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            read_only_hint: Some(false),
            destructive_hint: Some(false),
            idempotent_hint: Some(false),
            open_world_hint: Some(true),
        }
    }

    /// Check if all annotation fields are `None` (empty annotations).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.read_only_hint.is_none()
            && self.destructive_hint.is_none()
            && self.idempotent_hint.is_none()
            && self.open_world_hint.is_none()
    }
}

// ============================================================================
// Tool Contract Types
// ============================================================================

/// MCP Tool Call Result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Machine-readable structured data (MCP 2025-06-18+).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

/// Content block within a tool result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

impl ToolCallResult {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
            structured_content: None,
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: Some(true),
            structured_content: None,
        }
    }

    /// JSON payload as pretty text plus `structuredContent`.
    ///
    /// MCP requires structured content to be an object, so arrays are
    /// wrapped under `items`.
    #[must_use]
    pub fn json(value: Value) -> Self {
        let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        let structured = if value.is_object() {
            value
        } else {
            json!({ "items": value })
        };
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: None,
            structured_content: Some(structured),
        }
    }

    /// Error result tagged with the error's kind.
    #[must_use]
    pub fn from_error(error: &BridgeError) -> Self {
        let message = error.to_string();
        Self {
            content: vec![ToolContent::Text {
                text: message.clone(),
            }],
            is_error: Some(true),
            structured_content: Some(json!({
                "error": error.kind(),
                "message": message,
            })),
        }
    }

    /// Mark the result as failed while keeping its payload.
    #[must_use]
    pub const fn into_error(mut self) -> Self {
        self.is_error = Some(true);
        self
    }
}

// ============================================================================
// Client log messages
// ============================================================================

/// Severity of a message forwarded to the MCP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Notice,
    Warning,
    Error,
}

/// A log message a tool wants the MCP client to see while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientLog {
    pub level: LogLevel,
    pub logger: &'static str,
    pub message: String,
}
