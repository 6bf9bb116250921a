//! The closed set of tools this server exposes.

use serde_json::{Value, json};

/// One variant per tool; names on the wire map here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListTables,
    ExecuteQuery,
    ListImportFiles,
    ImportFile,
    CreateTableFromFile,
    DropTable,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::ListTables,
        ToolKind::ExecuteQuery,
        ToolKind::ListImportFiles,
        ToolKind::ImportFile,
        ToolKind::CreateTableFromFile,
        ToolKind::DropTable,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ListTables => "list_tables",
            Self::ExecuteQuery => "execute_query",
            Self::ListImportFiles => "list_import_files",
            Self::ImportFile => "import_file",
            Self::CreateTableFromFile => "create_table_from_file",
            Self::DropTable => "drop_table",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Used as the prefix of error messages ("error dropping table: ...").
    pub fn action(self) -> &'static str {
        match self {
            Self::ListTables => "listing tables",
            Self::ExecuteQuery => "executing query",
            Self::ListImportFiles => "listing import files",
            Self::ImportFile => "importing file",
            Self::CreateTableFromFile => "creating table",
            Self::DropTable => "dropping table",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ListTables => "List all tables in the ClickHouse database.",
            Self::ExecuteQuery => {
                "Execute a ClickHouse SQL query and return the resulting rows. \
                 Use LIMIT for exploratory queries."
            }
            Self::ListImportFiles => {
                "List CSV and Parquet files in the ClickHouse import directory. \
                 These files can be turned into tables with create_table_from_file."
            }
            Self::ImportFile => {
                "Copy a CSV or Parquet file from the local file system into the \
                 ClickHouse import directory."
            }
            Self::CreateTableFromFile => {
                "Create a MergeTree table from a CSV (with header row) or Parquet file \
                 already present in the import directory. The schema is inferred from the file."
            }
            Self::DropTable => "Drop a ClickHouse table.",
        }
    }

    pub fn input_schema(self) -> Value {
        match self {
            Self::ListTables => json!({
                "type": "object",
                "properties": {}
            }),
            Self::ExecuteQuery => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "SQL statement to execute"
                    }
                },
                "required": ["query"]
            }),
            Self::ListImportFiles => json!({
                "type": "object",
                "properties": {
                    "file_type": {
                        "type": "string",
                        "enum": ["csv", "parquet"],
                        "description": "Only list files of this type (default: both)"
                    }
                }
            }),
            Self::ImportFile => json!({
                "type": "object",
                "properties": {
                    "source_path": {
                        "type": "string",
                        "description": "Path of the .csv or .parquet file to copy"
                    },
                    "destination_name": {
                        "type": "string",
                        "description": "File name inside the import directory (default: source file name)"
                    }
                },
                "required": ["source_path"]
            }),
            Self::CreateTableFromFile => json!({
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table to create"
                    },
                    "file_name": {
                        "type": "string",
                        "description": "Name of a file in the import directory"
                    }
                },
                "required": ["table_name", "file_name"]
            }),
            Self::DropTable => json!({
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table to drop"
                    }
                },
                "required": ["table_name"]
            }),
        }
    }

    pub fn descriptor(self) -> mcp::Tool {
        mcp::Tool {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: self.input_schema(),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
