//! ClickHouse tool provider.
//!
//! Exposes a fixed set of database operations (list tables, run a query,
//! manage importable CSV/Parquet files, create and drop tables) as MCP tools.
//! Every tool answers with the same envelope:
//!
//! ```json
//! {"status": "success", "data": ...}
//! {"status": "error", "message": "..."}
//! ```
//!
//! Failures of the database or the file system never escape a tool; they are
//! reported as error envelopes for the calling model to read.

mod config;
mod database;
mod envelope;
mod error;
mod tools;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, DatabaseConfig, ProviderConfig};
pub use database::{ClickHouse, Column, Database, DatabaseError, Rows};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use tools::{FileType, ToolError, ToolKind, Toolbox};
