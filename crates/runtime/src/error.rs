use crate::model::ModelError;
use crate::tools::{McpError, ToolError};
use thiserror::Error;

/// Errors surfaced by the runtime.
///
/// Tool failures reported by the server never appear here; they reach the
/// model as observations. Only failures to talk to the model or the tool
/// server do.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("mcp error: {0}")]
    Mcp(#[from] McpError),
}

pub type Result<T> = std::result::Result<T, Error>;
