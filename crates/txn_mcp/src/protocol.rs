//! MCP Protocol implementation
//!
//! Handles JSON-RPC 2.0 framed as newline-delimited JSON over stdio, or over
//! any async byte stream pair.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};
use tracing::{debug, trace, warn};

use crate::ToolError;

/// MCP protocol revision advertised during initialize
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Method names understood by the server
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const PING: &str = "ping";
}

// =============================================================================
// JSON-RPC Types
// =============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Request ID (absent for notifications)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    /// Notifications carry no id and never get a response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Request ID this response corresponds to
    pub id: RequestId,

    /// Result (present on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error (present on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,

    /// Error message
    pub message: String,

    /// Additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Parse error (-32700)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::with_code(-32700, message)
    }

    /// Invalid request (-32600)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_code(-32600, message)
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::with_code(-32601, format!("Method not found: {}", method.into()))
    }

    /// Invalid params (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::with_code(-32602, message)
    }

    /// Internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_code(-32603, message)
    }

    /// Server not initialized (-32002)
    pub fn not_initialized() -> Self {
        Self::with_code(-32002, "Server not initialized")
    }

    /// Create from ToolError
    pub fn from_tool_error(err: &ToolError) -> Self {
        Self::with_code(err.error_code(), err.to_string())
    }
}

/// Request ID (can be string, number, or null)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
    #[default]
    Null,
}

// =============================================================================
// MCP-Specific Types
// =============================================================================

/// MCP Initialize request params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version
    pub protocol_version: String,

    /// Client capabilities
    #[serde(default)]
    pub capabilities: ClientCapabilities,

    /// Client info
    pub client_info: ClientInfo,
}

/// Client capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Roots capability (file system access)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<Value>,

    /// Sampling capability (LLM access)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Value>,
}

/// Client info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// MCP Initialize result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version
    pub protocol_version: String,

    /// Server capabilities
    pub capabilities: ServerCapabilities,

    /// Server info
    pub server_info: ServerInfo,
}

/// Server capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tools capability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Tools capability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: bool,
}

/// Server info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Tool definition for tools/list response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// tools/list result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}

/// tools/call params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,

    #[serde(default)]
    pub arguments: Value,
}

// =============================================================================
// Transport
// =============================================================================

/// One line read off the transport
#[derive(Debug)]
pub enum Incoming {
    Request(JsonRpcRequest),
    /// Line was not a valid JSON-RPC request
    Malformed(String),
}

/// Reads newline-delimited JSON-RPC messages
pub struct MessageReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Read the next message
    ///
    /// Returns None when the stream is closed (EOF). Blank lines are skipped.
    /// Lines that are not UTF-8 or not JSON-RPC come back as
    /// [`Incoming::Malformed`]; only transport failures are errors.
    pub async fn next_message(&mut self) -> Result<Option<Incoming>, ToolError> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                debug!("input closed (EOF)");
                return Ok(None);
            }

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!("Discarding non UTF-8 input line: {}", e);
                    return Ok(Some(Incoming::Malformed(format!(
                        "input is not valid UTF-8: {}",
                        e
                    ))));
                }
            };
            if line.is_empty() {
                continue;
            }
            trace!("Received: {}", line);

            return Ok(Some(match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) => {
                    debug!("Parsed request: method={}", request.method);
                    Incoming::Request(request)
                }
                Err(e) => {
                    warn!("Failed to parse request: {}", e);
                    Incoming::Malformed(e.to_string())
                }
            }));
        }
    }
}

/// Writes newline-delimited JSON-RPC responses
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a JSON-RPC response followed by a newline and flush
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> Result<(), ToolError> {
        let mut json = serde_json::to_string(response)?;
        trace!("Sending: {}", json);
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;

        debug!("Sent response for id={:?}", response.id);
        Ok(())
    }
}

/// Reader/writer pair bound to the process stdin and stdout
pub fn stdio() -> (MessageReader<BufReader<Stdin>>, MessageWriter<Stdout>) {
    (
        MessageReader::new(BufReader::new(tokio::io::stdin())),
        MessageWriter::new(tokio::io::stdout()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_id_variants() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert_eq!(req.id, Some(RequestId::Number(7)));

        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#).unwrap();
        assert_eq!(req.id, Some(RequestId::String("abc".into())));

        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn test_error_response_shape() {
        let resp = JsonRpcResponse::error(RequestId::Null, JsonRpcError::parse_error("bad"));
        let value = serde_json::to_value(&resp).unwrap();

        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], -32700);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_initialize_params_without_capabilities() {
        let params: InitializeParams = serde_json::from_value(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "clientInfo": {"name": "test", "version": "0.0.1"}
        }))
        .unwrap();
        assert!(params.capabilities.roots.is_none());
    }

    #[tokio::test]
    async fn test_reader_skips_blank_lines_and_flags_garbage() {
        let input = b"\n  \n{not json}\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
        let mut reader = MessageReader::new(&input[..]);

        assert!(matches!(
            reader.next_message().await.unwrap(),
            Some(Incoming::Malformed(_))
        ));
        match reader.next_message().await.unwrap() {
            Some(Incoming::Request(req)) => assert_eq!(req.method, "ping"),
            other => panic!("expected request, got {:?}", other),
        }
        assert!(reader.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reader_survives_invalid_utf8() {
        let input = b"\xff\xfe{garbage}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n";
        let mut reader = MessageReader::new(&input[..]);

        match reader.next_message().await.unwrap() {
            Some(Incoming::Malformed(message)) => assert!(message.contains("UTF-8")),
            other => panic!("expected malformed line, got {:?}", other),
        }
        assert!(matches!(
            reader.next_message().await.unwrap(),
            Some(Incoming::Request(req)) if req.method == "ping"
        ));
    }

    #[tokio::test]
    async fn test_writer_appends_newline() {
        let mut buf = Vec::new();
        {
            let mut writer = MessageWriter::new(&mut buf);
            writer
                .write_response(&JsonRpcResponse::success(RequestId::Number(1), json!({})))
                .await
                .unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
    }
}
