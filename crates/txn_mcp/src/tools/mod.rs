//! MCP tools exposed by the server.

mod registry;
mod transaction;

pub use registry::ToolRegistry;
pub use transaction::{TransactionTool, TRANSACTION_TOOL_NAME};
