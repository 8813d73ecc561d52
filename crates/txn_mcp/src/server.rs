//! MCP Server Implementation
//!
//! JSON-RPC 2.0 server for the Model Context Protocol.
//!
//! # Architecture
//!
//! The read loop handles `initialize`, `tools/list` and `ping` inline, so the
//! handshake is ordered with respect to later calls. Every `tools/call` runs on
//! its own tokio task; a single writer task owns the output stream and writes
//! one response per line, in completion order.
//!
//! # Example
//!
//! ```ignore
//! let registry = ToolRegistry::with_coordinator(coordinator);
//! let mut server = McpServer::new(McpServerConfig::default(), registry);
//! server.run_stdio().await?;
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::protocol::{
    self, methods, Incoming, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, MessageReader, MessageWriter, RequestId, ServerCapabilities, ServerInfo,
    ToolsCallParams, ToolsCapability, ToolsListResult, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use crate::ToolError;

/// Responses waiting for the writer task
const RESPONSE_QUEUE: usize = 256;

/// MCP Server configuration
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name (reported in initialize)
    pub server_name: String,

    /// Server version (reported in initialize)
    pub server_version: String,

    /// Maximum number of tool calls executing at once
    pub max_in_flight: usize,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            server_name: "transaction-manager".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            max_in_flight: 64,
        }
    }
}

/// MCP Server
pub struct McpServer {
    config: McpServerConfig,
    tools: Arc<ToolRegistry>,
    initialized: bool,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(config: McpServerConfig, tools: ToolRegistry) -> Self {
        Self {
            config,
            tools: Arc::new(tools),
            initialized: false,
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    /// Serve on the process stdin/stdout until stdin closes
    pub async fn run_stdio(&mut self) -> Result<(), ToolError> {
        let (reader, writer) = protocol::stdio();
        self.serve(reader, writer).await
    }

    /// Serve until the reader reaches EOF or the writer fails
    ///
    /// In-flight tool calls are drained before returning.
    pub async fn serve<R, W>(
        &mut self,
        mut reader: MessageReader<R>,
        writer: MessageWriter<W>,
    ) -> Result<(), ToolError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!(
            "MCP server starting ({} v{})",
            self.config.server_name, self.config.server_version
        );

        let (tx, rx) = mpsc::channel(RESPONSE_QUEUE);
        let writer_task = tokio::spawn(write_loop(writer, rx));
        let limit = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut calls = JoinSet::new();

        let read_result = loop {
            let incoming = match reader.next_message().await {
                Ok(Some(incoming)) => incoming,
                Ok(None) => break Ok(()),
                Err(e) => {
                    error!("Failed to read request: {}", e);
                    break Err(e);
                }
            };

            while let Some(joined) = calls.try_join_next() {
                log_join(joined);
            }

            let request = match incoming {
                Incoming::Request(request) => request,
                Incoming::Malformed(message) => {
                    let response = JsonRpcResponse::error(
                        RequestId::Null,
                        JsonRpcError::parse_error(format!("Invalid JSON: {}", message)),
                    );
                    if tx.send(response).await.is_err() {
                        break Ok(());
                    }
                    continue;
                }
            };

            if request.method == methods::TOOLS_CALL && !request.is_notification() {
                match self.prepare_call(request) {
                    Ok((id, params)) => {
                        let Ok(permit) = limit.clone().acquire_owned().await else {
                            break Ok(());
                        };
                        let tools = Arc::clone(&self.tools);
                        let tx = tx.clone();
                        calls.spawn(async move {
                            let response = call_tool(&tools, id, params).await;
                            drop(permit);
                            if tx.send(response).await.is_err() {
                                warn!("Dropped tool response: output closed");
                            }
                        });
                    }
                    Err(response) => {
                        if tx.send(response).await.is_err() {
                            break Ok(());
                        }
                    }
                }
                continue;
            }

            if let Some(response) = self.handle_request(request) {
                if tx.send(response).await.is_err() {
                    break Ok(());
                }
            }
        };

        while let Some(joined) = calls.join_next().await {
            log_join(joined);
        }
        drop(tx);

        let write_result = writer_task
            .await
            .map_err(|e| ToolError::Internal(format!("writer task failed: {}", e)))?;

        info!("MCP server shutting down");
        read_result.and(write_result)
    }

    /// Handle a request that is answered inline
    ///
    /// Returns None for notifications.
    fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!(
                    "Invalid JSON-RPC version: {}",
                    request.jsonrpc
                )),
            ));
        }

        let response = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(id, request.params),
            methods::INITIALIZED => JsonRpcResponse::success(id, Value::Object(Default::default())),
            methods::TOOLS_LIST => self.handle_tools_list(id),
            methods::PING => JsonRpcResponse::success(id, Value::Object(Default::default())),
            other => {
                debug!("Unknown method: {}", other);
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))
            }
        };
        Some(response)
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            methods::INITIALIZED => debug!("Client finished initialization"),
            other => debug!("Ignoring notification: {}", other),
        }
    }

    /// Handle initialize request
    fn handle_initialize(&mut self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params("Missing initialize params"),
            );
        };
        let params: InitializeParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                );
            }
        };

        info!(
            "Initialize from {} v{} (protocol {})",
            params.client_info.name, params.client_info.version, params.protocol_version
        );

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
            },
        };

        to_response(id, &result)
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.tools.list_tools(),
        };
        to_response(id, &result)
    }

    /// Validate a tools/call request before it is handed to a task
    fn prepare_call(
        &self,
        request: JsonRpcRequest,
    ) -> Result<(RequestId, ToolsCallParams), JsonRpcResponse> {
        let id = request.id.unwrap_or_default();

        if !self.initialized {
            return Err(JsonRpcResponse::error(id, JsonRpcError::not_initialized()));
        }

        let Some(params) = request.params else {
            return Err(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params("Missing tools/call params"),
            ));
        };

        match serde_json::from_value::<ToolsCallParams>(params) {
            Ok(params) => Ok((id, params)),
            Err(e) => Err(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)),
            )),
        }
    }
}

async fn call_tool(tools: &ToolRegistry, id: RequestId, params: ToolsCallParams) -> JsonRpcResponse {
    debug!("Calling tool: {}", params.name);

    match tools.call_tool(&params.name, params.arguments).await {
        Ok(result) => to_response(id, &result),
        Err(e) => {
            warn!("Tool call {} failed: {}", params.name, e);
            JsonRpcResponse::error(id, JsonRpcError::from_tool_error(&e))
        }
    }
}

fn to_response<T: serde::Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            id,
            JsonRpcError::internal_error(format!("Failed to encode result: {}", e)),
        ),
    }
}

async fn write_loop<W>(
    mut writer: MessageWriter<W>,
    mut rx: mpsc::Receiver<JsonRpcResponse>,
) -> Result<(), ToolError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        if let Err(e) = writer.write_response(&response).await {
            error!("Failed to write response: {}", e);
            return Err(e);
        }
    }
    Ok(())
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!("Tool call task failed: {}", e);
    }
}
