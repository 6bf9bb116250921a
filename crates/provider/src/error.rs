use thiserror::Error;

use crate::config::ConfigError;
use crate::database::DatabaseError;

/// Fatal server errors (startup or transport).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database unavailable: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Mcp(#[from] mcp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
