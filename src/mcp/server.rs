use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{RwLock, Semaphore, mpsc};
use tracing::{debug, error, info};

use crate::domain::BridgeSession;
use crate::error::Result;
use crate::ports::{ClientLog, ToolContext};

use super::protocol::{
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo, ToolCallParams, ToolCallResult,
    ToolsCapability, ToolsListResult, WriterMessage,
};
use super::registry::{ToolRegistry, create_default_registry};

/// Requests handled at the same time.
const MAX_CONCURRENT_REQUESTS: usize = 8;

/// MCP Server that communicates over stdio
pub struct McpServer {
    session: Arc<BridgeSession>,
    registry: ToolRegistry,
    concurrent_limit: Arc<Semaphore>,
    /// Writer channel used to forward tool log messages as notifications.
    /// Set in `serve()` before the read loop starts.
    notification_tx: RwLock<Option<mpsc::Sender<WriterMessage>>>,
}

impl McpServer {
    /// Create a server exposing every tool against `session`.
    #[must_use]
    pub fn new(session: Arc<BridgeSession>) -> Self {
        Self {
            session,
            registry: create_default_registry(),
            concurrent_limit: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
            notification_tx: RwLock::new(None),
        }
    }

    /// Build the context for one tool call.
    ///
    /// Log messages the tool emits are relayed to the client as
    /// `notifications/message` until the context and its clones are dropped.
    async fn create_tool_context(&self) -> ToolContext {
        let ctx = ToolContext::new(Arc::clone(&self.session));
        let Some(writer) = self.notification_tx.read().await.clone() else {
            return ctx;
        };

        let (log_tx, mut log_rx) = mpsc::channel::<ClientLog>(8);
        tokio::spawn(async move {
            while let Some(log) = log_rx.recv().await {
                let note = JsonRpcNotification::log_message(&log);
                if writer.send(WriterMessage::Notification(note)).await.is_err() {
                    break;
                }
            }
        });
        ctx.with_client_log(log_tx)
    }

    /// Run the server, reading from stdin and writing to stdout
    ///
    /// # Errors
    ///
    /// Returns an error if reading from stdin fails.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC from `input`, writing to `output`.
    ///
    /// Requests are processed concurrently, bounded by a semaphore. On EOF
    /// the bridge session is cleaned up before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `input` fails.
    pub async fn serve<R, W>(self: Arc<Self>, input: R, mut output: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<WriterMessage>(100);
        *self.notification_tx.write().await = Some(tx.clone());

        // Single writer: responses and notifications share the output stream.
        let writer_handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let json_str = match &msg {
                    WriterMessage::Response(r) => serde_json::to_string(r),
                    WriterMessage::Notification(n) => serde_json::to_string(n),
                };
                let json_str = match json_str {
                    Ok(s) => s,
                    Err(e) => {
                        error!(error = %e, "Failed to serialize message");
                        continue;
                    }
                };
                debug!(message = %json_str, "Sending message");

                if let Err(e) = output.write_all(json_str.as_bytes()).await {
                    error!(error = %e, "Failed to write message");
                    break;
                }
                if let Err(e) = output.write_all(b"\n").await {
                    error!(error = %e, "Failed to write newline");
                    break;
                }
                if let Err(e) = output.flush().await {
                    error!(error = %e, "Failed to flush output");
                    break;
                }
            }
        });

        let mut reader = BufReader::new(input);
        let mut line = String::new();
        let mut workers = tokio::task::JoinSet::new();

        info!("Lutron Caseta MCP server starting...");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                info!("Client disconnected, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let request = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(req) => req,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    let response = JsonRpcResponse::error(
                        None,
                        JsonRpcError::parse_error(format!("Invalid JSON: {e}")),
                    );
                    let _ = tx.send(WriterMessage::Response(Box::new(response))).await;
                    continue;
                }
            };

            let Ok(permit) = Arc::clone(&self.concurrent_limit).acquire_owned().await else {
                error!("Semaphore closed unexpectedly");
                break;
            };

            let server = Arc::clone(&self);
            let tx = tx.clone();

            workers.spawn(async move {
                if let Some(response) = server.handle_request(request).await {
                    let _ = tx.send(WriterMessage::Response(Box::new(response))).await;
                }
                drop(permit);
            });
        }

        // Let in-flight requests answer before the writer shuts down.
        while workers.join_next().await.is_some() {}
        self.session.cleanup().await;

        self.notification_tx.write().await.take();
        drop(tx);
        let _ = writer_handle.await;

        Ok(())
    }

    /// Dispatch one request. Notifications (no `id`) get no response.
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();

        let response = match request.method.as_str() {
            "initialize" => Self::handle_initialize(id, request.params),
            "notifications/initialized" | "initialized" => {
                debug!("Client initialization complete");
                return None;
            }
            method if method.starts_with("notifications/") => {
                debug!(method = %method, "Ignoring client notification");
                return None;
            }
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "ping" => JsonRpcResponse::success(id, json!({})),
            _ => {
                error!(method = %request.method, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method))
            }
        };
        Some(response)
    }

    fn handle_initialize(id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let mut negotiated_version = PROTOCOL_VERSION.to_string();

        if let Some(p) = params {
            match serde_json::from_value::<InitializeParams>(p) {
                Ok(init_params) => {
                    info!(
                        client = %init_params.client_info.name,
                        version = %init_params.client_info.version,
                        protocol = %init_params.protocol_version,
                        "Client connected"
                    );

                    // Echo the client's version if supported, otherwise offer our latest.
                    if SUPPORTED_PROTOCOL_VERSIONS.contains(&init_params.protocol_version.as_str())
                    {
                        negotiated_version = init_params.protocol_version;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Could not parse initialize params (continuing anyway)");
                }
            }
        }

        let result = InitializeResult {
            protocol_version: negotiated_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                logging: Some(json!({})),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
                description: Some(
                    "Control Lutron Caseta lights, switches, fans and shades via MCP".to_string(),
                ),
            },
            instructions: Some(
                "Lutron Caseta bridge control. Call check_connection first. If the server \
                 is not connected, ask the user for the bridge IP and run pair_bridge, \
                 warning them beforehand that they will need to press the small black \
                 button on the back of the bridge within 30 seconds. Then use \
                 list_devices to discover device IDs for turn_on_device, turn_off_device \
                 and set_device_level."
                    .to_string(),
            ),
        };

        JsonRpcResponse::success_or_serialize_error(id, &result)
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.registry.list_tools(),
        };

        JsonRpcResponse::success_or_serialize_error(id, &result)
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params"));
        };

        let call_params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid params: {e}")),
                );
            }
        };

        info!(tool = %call_params.name, "Tool call");

        let ctx = self.create_tool_context().await;

        match self
            .registry
            .execute(&call_params.name, call_params.arguments, &ctx)
            .await
        {
            Ok(result) => JsonRpcResponse::success_or_serialize_error(id, &result),
            Err(e) => {
                error!(tool = %call_params.name, kind = e.kind(), error = %e, "Tool call failed");
                JsonRpcResponse::success_or_serialize_error(id, &ToolCallResult::from_error(&e))
            }
        }
    }
}
