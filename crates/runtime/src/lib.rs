//! Quarry runtime: the query orchestrator.
//!
//! This crate connects a language model to the quarry tool server and runs
//! the bounded tool-call loop that answers user queries.
//!
//! # Overview
//!
//! - **Backend**: a trait abstracting LLM providers, with an Anthropic
//!   Messages API implementation.
//! - **ToolHost**: a trait abstracting tool execution, with an MCP
//!   implementation that spawns the tool server as a child process.
//! - **Session**: the conversation. It owns the call budget and loops between
//!   the model and the tools until the model answers or the budget runs out.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{AnthropicBackend, McpToolHost, ServerCommand, Session, SessionConfig};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = AnthropicBackend::builder("sk-ant-api01-...", runtime::DEFAULT_MODEL).build();
//! let tools = McpToolHost::connect(
//!     &ServerCommand::new("quarry-server"),
//!     runtime::DEFAULT_CALL_TIMEOUT,
//! )
//! .await?;
//!
//! let mut session = Session::new(backend, tools, SessionConfig::default());
//! let outcome = session.ask("Which tables are there?").await?;
//! println!("{}", outcome.reply);
//!
//! let (_, tools) = session.into_parts();
//! tools.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod budget;
mod error;
pub mod model;
mod providers;
mod session;
pub mod tools;

pub use budget::{CallBudget, DEFAULT_CALL_BUDGET};
pub use error::{Error, Result};
pub use model::{
    Backend, FinishReason, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall,
    ToolOutcome, ToolResult, ToolSpec, Usage,
};
pub use providers::{AnthropicBackend, AnthropicBackendBuilder, DEFAULT_MODEL};
pub use session::{
    HistoryPolicy, QueryOutcome, Reply, Session, SessionConfig, SessionId, ToolCallRecord,
};
pub use tools::{
    DEFAULT_CALL_TIMEOUT, McpClient, McpError, McpToolHost, ServerCommand, ToolError, ToolHost,
};
