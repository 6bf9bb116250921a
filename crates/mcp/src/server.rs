//! MCP server loop (newline-delimited JSON-RPC over a byte stream).

use std::future::Future;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::Result;
use crate::protocol::{
    CallToolParams, CallToolResult, INTERNAL_ERROR, INVALID_REQUEST, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcResponse, ListToolsResult,
    PROTOCOL_VERSION, RequestId, ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};

/// Maximum accepted size of one incoming message (1MB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// A fixed set of tools served over MCP.
///
/// `call_tool` is infallible: failures are reported inside the returned
/// [`CallToolResult`], never as protocol errors.
pub trait ToolProvider: Send + Sync {
    /// Catalog returned by `tools/list`.
    fn tools(&self) -> Vec<Tool>;

    /// Execute one tool call.
    fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> impl Future<Output = CallToolResult> + Send;
}

/// MCP server wrapping a [`ToolProvider`].
pub struct Server<P> {
    info: ServerInfo,
    instructions: Option<String>,
    provider: P,
}

impl<P: ToolProvider> Server<P> {
    pub fn new(name: impl Into<String>, version: impl Into<String>, provider: P) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            instructions: None,
            provider,
        }
    }

    /// Instructions returned to the client on initialize.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Serve on the process's stdin/stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until the reader reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(server = %self.info.name, "MCP server starting");
        let mut reader = BufReader::new(reader);

        loop {
            let mut buf = Vec::new();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                tracing::info!("input closed, shutting down");
                break;
            }

            let response = if buf.len() > MAX_MESSAGE_SIZE {
                tracing::warn!(size = buf.len(), "message too large");
                Some(JsonRpcResponse::failure(
                    None,
                    JsonRpcError::parse_error(format!(
                        "message too large: {} bytes (max {MAX_MESSAGE_SIZE})",
                        buf.len()
                    )),
                ))
            } else {
                match String::from_utf8(buf) {
                    Ok(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        self.handle_line(line).await
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "message is not valid UTF-8");
                        Some(JsonRpcResponse::failure(
                            None,
                            JsonRpcError::parse_error(format!("invalid UTF-8: {e}")),
                        ))
                    }
                }
            };

            if let Some(response) = response {
                let json = serde_json::to_string(&response)?;
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle one raw message; `None` when no response is due.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse JSON");
                return Some(JsonRpcResponse::failure(
                    None,
                    JsonRpcError::parse_error(e.to_string()),
                ));
            }
        };

        // Responses to server-initiated requests; we never send any.
        if raw.get("method").is_none() {
            if let Some(id) = raw.get("id").filter(|id| !id.is_null()) {
                if raw.get("result").is_none() && raw.get("error").is_none() {
                    let id = serde_json::from_value(id.clone()).ok();
                    return Some(JsonRpcResponse::failure(
                        id,
                        JsonRpcError::new(INVALID_REQUEST, "missing method"),
                    ));
                }
            }
            tracing::debug!("ignoring message without method");
            return None;
        }

        let message: JsonRpcMessage = match serde_json::from_value(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "invalid JSON-RPC message");
                return Some(JsonRpcResponse::failure(
                    None,
                    JsonRpcError::new(INVALID_REQUEST, e.to_string()),
                ));
            }
        };

        match message.id {
            None => {
                self.handle_notification(&message.method);
                None
            }
            Some(id) => Some(
                self.handle_request(id, &message.method, message.params)
                    .await,
            ),
        }
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => tracing::info!("client confirmed initialization"),
            "notifications/cancelled" => tracing::debug!("client cancelled a request"),
            method => tracing::debug!(method, "ignoring notification"),
        }
    }

    async fn handle_request(
        &self,
        id: RequestId,
        method: &str,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        tracing::debug!(method, ?id, "request");
        let result = match method {
            "initialize" => self.initialize(params),
            "ping" => Ok(Value::Object(Default::default())),
            "tools/list" => to_value(ListToolsResult {
                tools: self.provider.tools(),
            }),
            "tools/call" => self.call_tool(params).await,
            method => {
                tracing::warn!(method, "unknown method");
                Err(JsonRpcError::method_not_found(method))
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::failure(Some(id), error),
        }
    }

    fn initialize(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: Option<InitializeParams> = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;

        let (protocol_version, client) = match params {
            Some(p) => (p.protocol_version, p.client_info.map(|c| c.name)),
            None => (None, None),
        };
        tracing::info!(client = ?client, version = ?protocol_version, "initialize");

        to_value(InitializeResult {
            protocol_version: protocol_version.unwrap_or_else(|| PROTOCOL_VERSION.to_string()),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
        let params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;

        tracing::info!(tool = %params.name, "tools/call");
        let result = self.provider.call_tool(&params.name, params.arguments).await;
        to_value(result)
    }
}

fn to_value(value: impl serde::Serialize) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
}
