//! The uniform `{status, data | message}` result every tool returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one tool invocation as seen by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope {
    Success { data: Value },
    Error { message: String },
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self::Success { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Wrap as an MCP tool result: one text block holding the envelope JSON.
    pub fn into_call_result(self) -> mcp::CallToolResult {
        let is_error = self.is_error();
        let text = serde_json::to_string(&self).unwrap_or_else(|e| {
            format!(r#"{{"status":"error","message":"failed to encode result: {e}"}}"#)
        });
        mcp::CallToolResult::text(text, is_error)
    }
}
