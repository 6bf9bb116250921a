//! Tool execution and MCP integration.

pub mod errors;
mod host;
mod mcp_client;
mod mcp_host;

pub use errors::ToolError;
pub use mcp_client::{McpClient, McpError, ServerCommand};
pub use mcp_host::{DEFAULT_CALL_TIMEOUT, McpToolHost};
pub use host::ToolHost;
