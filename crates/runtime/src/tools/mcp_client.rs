//! MCP (Model Context Protocol) client integration.
//!
//! This module provides MCP server management using the official rmcp SDK.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{McpClient, ServerCommand};
//!
//! # async fn example() -> Result<(), runtime::McpError> {
//! let client = McpClient::spawn(&ServerCommand::new("quarry-server")).await?;
//!
//! let tools = client.list_tools().await?;
//! for tool in &tools {
//!     println!("Tool: {}", tool.name);
//! }
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, CallToolResult, Tool},
    service::RunningService,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde::Deserialize;
use tokio::process::Command;

/// Error type for MCP operations.
pub type McpError = Box<dyn std::error::Error + Send + Sync>;

/// How to launch the tool server process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the child, on top of the inherited one.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ServerCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// An MCP client connected to a server process.
pub struct McpClient {
    service: RunningService<rmcp::service::RoleClient, ()>,
}

impl McpClient {
    /// Spawn an MCP server and connect to it.
    pub async fn spawn(server: &ServerCommand) -> Result<Self, McpError> {
        let transport = TokioChildProcess::new(Command::new(&server.command).configure(|cmd| {
            cmd.args(&server.args);
            cmd.envs(&server.env);
        }))?;

        let service = ().serve(transport).await?;
        tracing::debug!(server = %server, "mcp server connected");

        Ok(Self { service })
    }

    /// List available tools from the server.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        let response = self.service.list_tools(Default::default()).await?;
        Ok(response.tools)
    }

    /// Call a tool with the given name and arguments.
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CallToolResult, McpError> {
        let params = CallToolRequestParams {
            name: name.into().into(),
            arguments,
            meta: None,
            task: None,
        };

        let result = self.service.call_tool(params).await?;
        Ok(result)
    }

    /// Cancel the connection and wait for the server process to exit.
    pub async fn shutdown(self) -> Result<(), McpError> {
        let reason = self.service.cancel().await?;
        tracing::debug!(?reason, "mcp server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_command_builder_and_display() {
        let server = ServerCommand::new("quarry-server")
            .arg("--verbose")
            .env("RUST_LOG", "warn");
        assert_eq!(server.to_string(), "quarry-server --verbose");
        assert_eq!(server.env.get("RUST_LOG").map(String::as_str), Some("warn"));
    }

    #[test]
    fn server_command_deserializes_with_defaults() {
        let server: ServerCommand = serde_json::from_str(r#"{"command": "quarry-server"}"#).unwrap();
        assert_eq!(server, ServerCommand::new("quarry-server"));
    }
}
