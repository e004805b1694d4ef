//! Pair Bridge Tool Handler
//!
//! Runs the pairing handshake against a bridge, saves the credentials to
//! the configured certificate directory and switches the session over to
//! the newly paired bridge.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::info;

use crate::error::Result;
use crate::mcp::device_tool::parse_args;
use crate::mcp::protocol::{ClientLog, LogLevel, ToolCallResult};
use crate::ports::{ToolContext, ToolHandler, ToolSchema};
use crate::security::validate_host_ip;

/// Shown to the client when the bridge starts waiting for the button.
pub const BUTTON_PROMPT: &str = "PRESS THE BUTTON NOW: Find the small black button on the back \
    of your Lutron Caseta bridge and press it now! You have 30 seconds...";

#[derive(Debug, Deserialize)]
struct PairBridgeArgs {
    bridge_ip: String,
}

/// Pairing tool handler
#[derive(Default)]
pub struct PairBridgeHandler;

impl PairBridgeHandler {
    const SCHEMA: &'static str = r#"{
        "type": "object",
        "properties": {
            "bridge_ip": {
                "type": "string",
                "description": "IP address of the Lutron Caseta bridge"
            }
        },
        "required": ["bridge_ip"]
    }"#;

    /// Forward the ready signal to the client once the bridge is waiting.
    fn forward_ready(ctx: &ToolContext) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        let client_log = ctx.client_log.clone();
        tokio::spawn(async move {
            if rx.await.is_err() {
                return;
            }
            info!("Bridge is waiting for the button press");
            if let Some(log_tx) = client_log {
                let _ = log_tx
                    .send(ClientLog {
                        level: LogLevel::Notice,
                        logger: "pair_bridge",
                        message: BUTTON_PROMPT.to_string(),
                    })
                    .await;
            }
        });
        tx
    }
}

#[async_trait]
impl ToolHandler for PairBridgeHandler {
    fn name(&self) -> &'static str {
        "pair_bridge"
    }

    fn description(&self) -> &'static str {
        "Pair with a Lutron Caseta bridge and save its certificates. Before calling this \
         tool, tell the user: \"I'm about to start pairing. Please be ready to press the \
         small black button on the back of your Lutron Caseta bridge within 30 seconds.\" \
         On success the server connects to the bridge right away."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name(),
            description: self.description(),
            input_schema: Self::SCHEMA,
        }
    }

    async fn execute(&self, args: Option<Value>, ctx: &ToolContext) -> Result<ToolCallResult> {
        let args: PairBridgeArgs = parse_args(args)?;

        let address = match validate_host_ip(&args.bridge_ip) {
            Ok(address) => address,
            Err(e) => {
                return Ok(ToolCallResult::json(json!({
                    "success": false,
                    "error": e.kind(),
                    "message": format!("INVALID INPUT: {e}"),
                    "status": "Please provide a valid IP address for your Lutron Caseta bridge.",
                    "connected": false,
                }))
                .into_error());
            }
        };

        let cert_dir = ctx.session.config().await.cert_dir;
        let ready = Self::forward_ready(ctx);
        let result = ctx
            .session
            .pairing()
            .pair(&address, &cert_dir, Some(ready))
            .await;

        if !result.success {
            return Ok(ToolCallResult::json(json!({
                "success": false,
                "message": format!("FAILED: {}", result.message),
                "status": "Pairing failed. Please try again and make sure to press the small \
                           black button on the back of your bridge when the pairing starts.",
                "connected": false,
            }))
            .into_error());
        }

        let connected = ctx.session.activate(&address).await;
        let status = if connected {
            "Your Lutron Caseta bridge is now connected and ready to control lights."
        } else {
            "Certificates were saved but the bridge did not accept a connection. \
             Use check_connection to retry."
        };

        Ok(ToolCallResult::json(json!({
            "success": true,
            "message": format!("Bridge paired successfully! {}", result.message),
            "status": status,
            "connected": connected,
            "certificate_files": result.data,
        })))
    }
}
