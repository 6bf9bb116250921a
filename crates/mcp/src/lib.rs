//! MCP (Model Context Protocol) server library.
//!
//! Serves a fixed set of tools to an MCP client over newline-delimited
//! JSON-RPC, typically on stdio.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{CallToolResult, Server, Tool, ToolProvider};
//! use serde_json::{Value, json};
//!
//! struct Clock;
//!
//! impl ToolProvider for Clock {
//!     fn tools(&self) -> Vec<Tool> {
//!         vec![Tool {
//!             name: "now".to_string(),
//!             description: Some("Current time".to_string()),
//!             input_schema: json!({"type": "object"}),
//!         }]
//!     }
//!
//!     async fn call_tool(&self, _name: &str, _args: Option<Value>) -> CallToolResult {
//!         CallToolResult::text("12:00", false)
//!     }
//! }
//!
//! # async fn example() -> mcp::Result<()> {
//! Server::new("clock", "0.1.0", Clock).serve_stdio().await
//! # }
//! ```

mod error;
mod protocol;
mod server;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcResponse,
    ListToolsResult, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ServerInfo, Tool, ToolContent, ToolsCapability,
};
pub use server::{MAX_MESSAGE_SIZE, Server, ToolProvider};
