//! Tool trait, tool results and tool errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Tool Error Types
// =============================================================================

/// Errors that can occur while dispatching a tool call
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool registered under the requested name
    #[error("Unknown tool: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Get the JSON-RPC error code for this error type
    pub fn error_code(&self) -> i32 {
        match self {
            ToolError::NotFound(_) => -32602,
            ToolError::Internal(_) => -32603,
            ToolError::Serialization(_) => -32700,
            ToolError::Io(_) => -32603,
        }
    }
}

// =============================================================================
// Tool Results
// =============================================================================

/// Result of tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Content blocks returned by the tool
    pub content: Vec<ToolContent>,

    /// Whether this result indicates an error
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: false,
        }
    }

    /// Create a successful result holding compact JSON
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        Ok(Self::text(serde_json::to_string(value)?))
    }

    /// Append a content block
    pub fn with_content(mut self, content: ToolContent) -> Self {
        self.content.push(content);
        self
    }

    /// Mark the result as an error
    pub fn into_error(mut self) -> Self {
        self.is_error = true;
        self
    }

    /// Text of the first text block, if any
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Text { text } => Some(text.as_str()),
        })
    }
}

/// Content types that can be returned by tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content
    Text { text: String },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

// =============================================================================
// Tool Trait
// =============================================================================

/// Trait for implementing MCP tools
///
/// Domain failures belong in a [`ToolResult`] with `is_error` set; a
/// [`ToolError`] means the call could not be dispatched at all.
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Unique name of the tool
    fn name(&self) -> &'static str;

    /// Human-readable description of what the tool does
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments
    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_text() {
        let result = ToolResult::text("Hello, world!");
        assert!(!result.is_error);
        assert_eq!(result.first_text(), Some("Hello, world!"));
    }

    #[test]
    fn test_tool_result_error_serialization() {
        let result = ToolResult::text("{}")
            .with_content(ToolContent::text("boom"))
            .into_error();
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][1], json!({"type": "text", "text": "boom"}));
    }

    #[test]
    fn test_success_omits_is_error() {
        let value = serde_json::to_value(ToolResult::text("ok")).unwrap();
        assert!(value.get("isError").is_none());
    }

    #[test]
    fn test_tool_error_codes() {
        assert_eq!(ToolError::NotFound("".into()).error_code(), -32602);
        assert_eq!(ToolError::Internal("".into()).error_code(), -32603);
    }
}
