//! The six database tools and their dispatch table.

mod args;
mod catalog;
mod errors;
mod files;
mod tables;

use std::path::{Path, PathBuf};

use serde_json::Value;

pub use args::FileType;
pub use catalog::ToolKind;
pub use errors::ToolError;

use crate::database::Database;
use crate::envelope::Envelope;

/// Binds the tool catalog to a database and an import directory.
pub struct Toolbox<D> {
    db: D,
    import_dir: PathBuf,
}

impl<D: Database> Toolbox<D> {
    pub fn new(db: D, import_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            import_dir: import_dir.into(),
        }
    }

    pub fn import_dir(&self) -> &Path {
        &self.import_dir
    }

    /// Run a tool by name. Never fails: every problem, including an
    /// unknown name, comes back as an error envelope.
    pub async fn dispatch(&self, name: &str, arguments: Option<Value>) -> Envelope {
        let Some(kind) = ToolKind::from_name(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return Envelope::error(format!("unknown tool: {name}"));
        };

        match self.run(kind, arguments).await {
            Ok(data) => Envelope::success(data),
            Err(e) => {
                tracing::warn!(tool = %kind, error = %e, "tool failed");
                Envelope::error(format!("error {}: {e}", kind.action()))
            }
        }
    }

    async fn run(&self, kind: ToolKind, arguments: Option<Value>) -> Result<Value, ToolError> {
        match kind {
            ToolKind::ListTables => tables::list_tables(&self.db).await,
            ToolKind::ExecuteQuery => tables::execute_query(&self.db, args::parse(arguments)?).await,
            ToolKind::ListImportFiles => {
                files::list_import_files(&self.import_dir, args::parse(arguments)?).await
            }
            ToolKind::ImportFile => files::import_file(&self.import_dir, args::parse(arguments)?).await,
            ToolKind::CreateTableFromFile => {
                tables::create_table_from_file(&self.db, &self.import_dir, args::parse(arguments)?)
                    .await
            }
            ToolKind::DropTable => tables::drop_table(&self.db, args::parse(arguments)?).await,
        }
    }
}

impl<D: Database> mcp::ToolProvider for Toolbox<D> {
    fn tools(&self) -> Vec<mcp::Tool> {
        ToolKind::ALL.into_iter().map(ToolKind::descriptor).collect()
    }

    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> mcp::CallToolResult {
        self.dispatch(name, arguments).await.into_call_result()
    }
}
