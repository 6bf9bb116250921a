//! MCP-backed tool host.

use std::time::Duration;

use super::{McpClient, McpError, ServerCommand, ToolError, ToolHost};
use crate::model::{ToolCall, ToolOutcome, ToolSpec};
use rmcp::model::Tool;
use serde_json::Value;

/// Default limit on a single tool call. Kept above the server's 30 s
/// statement timeout so a slow statement comes back as an error envelope.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Tool host backed by an MCP server.
pub struct McpToolHost {
    client: McpClient,
    specs: Vec<ToolSpec>,
    timeout: Duration,
}

impl McpToolHost {
    /// Spawn the MCP server and cache its tool catalog.
    pub async fn connect(server: &ServerCommand, timeout: Duration) -> Result<Self, McpError> {
        let client = McpClient::spawn(server).await?;
        let specs = match client.list_tools().await {
            Ok(tools) => tools.into_iter().map(spec_from_tool).collect::<Vec<_>>(),
            Err(e) => {
                // Reap the child before giving up.
                if let Err(shutdown) = client.shutdown().await {
                    tracing::warn!(error = %shutdown, "mcp shutdown failed");
                }
                return Err(e);
            }
        };
        tracing::info!(server = %server, tools = specs.len(), "tool catalog loaded");
        Ok(Self {
            client,
            specs,
            timeout,
        })
    }

    /// Close the connection to the server.
    pub async fn shutdown(self) -> Result<(), McpError> {
        self.client.shutdown().await
    }
}

impl ToolHost for McpToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutcome, ToolError> {
        let arguments = match &call.input {
            Value::Object(map) => Some(map.clone()),
            Value::Null => None,
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "expected an object, got {other}"
                )));
            }
        };

        let result = tokio::time::timeout(self.timeout, self.client.call_tool(&call.name, arguments))
            .await
            .map_err(|_| ToolError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let raw = serde_json::to_value(&result)
            .map_err(|e| ToolError::Transport(format!("serialize result: {e}")))?;
        Ok(outcome_from_result(&raw))
    }
}

fn spec_from_tool(tool: Tool) -> ToolSpec {
    ToolSpec {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or_default().to_string(),
        input_schema: Value::Object((*tool.input_schema).clone()),
    }
}

/// Read a serialized `CallToolResult` back into an outcome.
///
/// The server puts the `{status, data | message}` envelope in the text
/// content; anything else is passed through as plain text.
fn outcome_from_result(raw: &Value) -> ToolOutcome {
    let text = raw["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if let Ok(outcome) = serde_json::from_str::<ToolOutcome>(&text) {
        return outcome;
    }

    if raw["isError"].as_bool().unwrap_or(false) {
        ToolOutcome::error(text)
    } else {
        ToolOutcome::success(Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_text_is_decoded() {
        let raw = json!({
            "content": [{"type": "text", "text": r#"{"status":"success","data":["orders","users"]}"#}],
            "isError": false
        });
        assert_eq!(
            outcome_from_result(&raw),
            ToolOutcome::success(json!(["orders", "users"]))
        );
    }

    #[test]
    fn error_envelope_is_decoded() {
        let raw = json!({
            "content": [{"type": "text", "text": r#"{"status":"error","message":"error dropping table: no such table"}"#}],
            "isError": true
        });
        assert_eq!(
            outcome_from_result(&raw),
            ToolOutcome::error("error dropping table: no such table")
        );
    }

    #[test]
    fn plain_text_falls_back_on_is_error() {
        let ok = json!({"content": [{"type": "text", "text": "done"}]});
        assert_eq!(outcome_from_result(&ok), ToolOutcome::success(json!("done")));

        let failed = json!({
            "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}],
            "isError": true
        });
        assert_eq!(outcome_from_result(&failed), ToolOutcome::error("a\nb"));
    }
}
