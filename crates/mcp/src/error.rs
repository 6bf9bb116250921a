//! MCP server error types.

use thiserror::Error;

/// Errors that end the serve loop.
///
/// Anything a client can cause (bad JSON, unknown methods, bad params) is
/// answered on the wire instead; only transport failures surface here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
