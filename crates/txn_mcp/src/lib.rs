//! MCP server for the transaction manager.
//!
//! Speaks newline-delimited JSON-RPC 2.0 over stdio and exposes a single
//! `transaction` tool backed by [`txn_core::TransactionCoordinator`].
//!
//! # Example
//!
//! ```ignore
//! use txn_mcp::{McpServer, McpServerConfig, ToolRegistry};
//!
//! let registry = ToolRegistry::with_coordinator(coordinator);
//! McpServer::new(McpServerConfig::default(), registry).run_stdio().await?;
//! ```

pub mod protocol;
pub mod server;
pub mod tools;
pub mod types;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use server::{McpServer, McpServerConfig};
pub use tools::{ToolRegistry, TransactionTool, TRANSACTION_TOOL_NAME};
pub use types::{McpTool, ToolContent, ToolError, ToolResult};
