//! `transaction` tool: start, resume and close ephemeral transactions.

use async_trait::async_trait;
use serde_json::{json, Value};
use txn_core::TransactionCoordinator;

use crate::types::{McpTool, ToolContent, ToolError, ToolResult};

pub const TRANSACTION_TOOL_NAME: &str = "transaction";

/// Routes tool calls to a [`TransactionCoordinator`].
pub struct TransactionTool {
    coordinator: TransactionCoordinator,
}

impl TransactionTool {
    pub fn new(coordinator: TransactionCoordinator) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl McpTool for TransactionTool {
    fn name(&self) -> &'static str {
        TRANSACTION_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Manages simple stateful transactions (start, resume, close)"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["start", "resume", "close"],
                    "description": "Action to perform"
                },
                "token": {
                    "type": "string",
                    "description": "Transaction token (required for resume/close, forbidden for start)"
                },
                "payload": {
                    "description": "Opaque state stored with the transaction"
                },
                "ttlSeconds": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Time-to-live in seconds (default 3600, capped at 86400)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let response = self.coordinator.handle_value(args).await;
        let result = ToolResult::json(&response)?;

        Ok(match response.error {
            Some(message) => result.with_content(ToolContent::text(message)).into_error(),
            None => result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use txn_store::MemoryTtlStore;

    fn tool() -> TransactionTool {
        TransactionTool::new(TransactionCoordinator::with_store(Arc::new(
            MemoryTtlStore::new(),
        )))
    }

    fn response_of(result: &ToolResult) -> Value {
        serde_json::from_str(result.first_text().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_start_returns_single_block() {
        let result = tool()
            .execute(json!({"action": "start", "payload": {"a": 1}}))
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(result.content.len(), 1);
        let response = response_of(&result);
        assert_eq!(response["status"], "pending");
        assert_eq!(response["payload"], json!({"a": 1}));
        assert!(response["token"].as_str().unwrap().starts_with("txn:"));
    }

    #[tokio::test]
    async fn test_error_adds_message_block() {
        let result = tool()
            .execute(json!({"action": "resume"}))
            .await
            .unwrap();

        assert!(result.is_error);
        assert_eq!(result.content.len(), 2);
        let response = response_of(&result);
        assert_eq!(response["status"], "error");
        assert_eq!(response["token"], "unknown");
        assert_eq!(response["errorKind"], "client");
        assert_eq!(
            result.content[1],
            ToolContent::text(response["error"].as_str().unwrap())
        );
    }

    #[tokio::test]
    async fn test_unknown_action_is_invalid_params() {
        let result = tool()
            .execute(json!({"action": "commit", "token": "txn:x"}))
            .await
            .unwrap();

        let response = response_of(&result);
        assert!(result.is_error);
        assert_eq!(response["token"], "txn:x");
        assert!(response["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid params"));
    }

    #[test]
    fn test_schema_requires_action() {
        let schema = tool().input_schema();
        assert_eq!(schema["required"], json!(["action"]));
        assert_eq!(schema["properties"]["ttlSeconds"]["minimum"], 1);
    }
}
