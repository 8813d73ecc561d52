//! End-to-end MCP sessions driven over in-memory pipes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;
use txn_core::TransactionCoordinator;
use txn_mcp::protocol::{MessageReader, MessageWriter, MCP_PROTOCOL_VERSION};
use txn_mcp::{McpServer, McpServerConfig, ToolError, ToolRegistry};
use txn_store::MemoryTtlStore;

struct Client {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    next_id: i64,
    server: JoinHandle<Result<(), ToolError>>,
}

impl Client {
    fn start() -> Self {
        let coordinator = TransactionCoordinator::with_store(Arc::new(MemoryTtlStore::new()));
        let mut server = McpServer::new(
            McpServerConfig::default(),
            ToolRegistry::with_coordinator(coordinator),
        );

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let server = tokio::spawn(async move {
            server
                .serve(
                    MessageReader::new(BufReader::new(server_read)),
                    MessageWriter::new(server_write),
                )
                .await
        });

        let (client_read, writer) = tokio::io::split(client_io);
        Self {
            writer,
            lines: BufReader::new(client_read).lines(),
            next_id: 0,
            server,
        }
    }

    async fn send_raw(&mut self, line: &str) {
        self.send_bytes(line.as_bytes()).await;
    }

    async fn send_bytes(&mut self, line: &[u8]) {
        self.writer.write_all(line).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn send(&mut self, method: &str, params: Value) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        let message = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.send_raw(&message.to_string()).await;
        id
    }

    async fn recv(&mut self) -> Value {
        let line = self.lines.next_line().await.unwrap().expect("server closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.send(method, params).await;
        let response = self.recv().await;
        assert_eq!(response["id"], id);
        response
    }

    async fn initialize(&mut self) {
        let response = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "session-test", "version": "0.1"}
                }),
            )
            .await;
        assert!(response.get("error").is_none(), "{}", response);
        self.send_raw(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
    }

    /// Call the transaction tool and decode the embedded response
    async fn transaction(&mut self, arguments: Value) -> (Value, Value) {
        let response = self
            .request(
                "tools/call",
                json!({"name": "transaction", "arguments": arguments}),
            )
            .await;
        let result = response["result"].clone();
        let body = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        (result, body)
    }

    async fn shutdown(mut self) {
        self.writer.shutdown().await.unwrap();
        self.server.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_full_transaction_lifecycle() {
    let mut client = Client::start();
    client.initialize().await;

    let (result, started) = client
        .transaction(json!({"action": "start", "payload": {"step": 1}, "ttlSeconds": 60}))
        .await;
    assert!(result.get("isError").is_none());
    assert_eq!(started["status"], "pending");
    let token = started["token"].as_str().unwrap().to_string();

    let (_, resumed) = client
        .transaction(json!({"action": "resume", "token": token, "payload": {"step": 2}}))
        .await;
    assert_eq!(resumed["payload"], json!({"step": 2}));

    let (_, closed) = client
        .transaction(json!({"action": "close", "token": token}))
        .await;
    assert_eq!(closed["status"], "closed");
    assert_eq!(closed["expiresAt"], Value::Null);

    let (result, missing) = client
        .transaction(json!({"action": "resume", "token": token}))
        .await;
    assert_eq!(result["isError"], true);
    assert_eq!(missing["status"], "error");
    assert_eq!(missing["errorKind"], "client");
    assert_eq!(result["content"][1]["text"], missing["error"]);

    client.shutdown().await;
}

#[tokio::test]
async fn test_tools_list() {
    let mut client = Client::start();
    client.initialize().await;

    let response = client.request("tools/list", json!({})).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "transaction");
    assert_eq!(
        tools[0]["inputSchema"]["properties"]["action"]["enum"],
        json!(["start", "resume", "close"])
    );

    client.shutdown().await;
}

#[tokio::test]
async fn test_call_before_initialize_is_rejected() {
    let mut client = Client::start();

    let response = client
        .request(
            "tools/call",
            json!({"name": "transaction", "arguments": {"action": "start"}}),
        )
        .await;
    assert_eq!(response["error"]["code"], -32002);

    client.shutdown().await;
}

#[tokio::test]
async fn test_garbage_line_gets_parse_error() {
    let mut client = Client::start();

    client.send_raw("this is not json").await;
    let response = client.recv().await;
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], -32700);

    // The session survives a bad line.
    let response = client.request("ping", json!({})).await;
    assert_eq!(response["result"], json!({}));

    client.shutdown().await;
}

#[tokio::test]
async fn test_invalid_utf8_line_gets_parse_error() {
    let mut client = Client::start();

    client.send_bytes(b"\xff\xfe{garbage}").await;
    let response = client.recv().await;
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], -32700);

    let response = client.request("ping", json!({})).await;
    assert_eq!(response["result"], json!({}));

    client.shutdown().await;
}

#[tokio::test]
async fn test_unknown_method_and_tool() {
    let mut client = Client::start();
    client.initialize().await;

    let response = client.request("prompts/list", json!({})).await;
    assert_eq!(response["error"]["code"], -32601);

    let response = client
        .request("tools/call", json!({"name": "ledger", "arguments": {}}))
        .await;
    assert_eq!(response["error"]["code"], -32602);

    client.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_each_get_one_response() {
    let mut client = Client::start();
    client.initialize().await;

    let mut sent = Vec::new();
    for i in 0..20 {
        let id = client
            .send(
                "tools/call",
                json!({"name": "transaction", "arguments": {"action": "start", "payload": {"n": i}}}),
            )
            .await;
        sent.push((id, i));
    }

    let mut by_id = HashMap::new();
    for _ in 0..sent.len() {
        let response = client.recv().await;
        let id = response["id"].as_i64().unwrap();
        assert!(by_id.insert(id, response).is_none(), "duplicate response {}", id);
    }

    for (id, n) in sent {
        let text = by_id[&id]["result"]["content"][0]["text"].as_str().unwrap();
        let body: Value = serde_json::from_str(text).unwrap();
        assert_eq!(body["payload"], json!({"n": n}));
    }

    client.shutdown().await;
}
