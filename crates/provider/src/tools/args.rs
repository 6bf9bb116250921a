//! Typed tool arguments and the lightweight checks run before touching
//! the database or file system.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ToolError;

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryArgs {
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListImportFilesArgs {
    #[serde(default)]
    pub file_type: Option<FileType>,
}

#[derive(Debug, Deserialize)]
pub struct ImportFileArgs {
    pub source_path: String,
    #[serde(default)]
    pub destination_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTableArgs {
    pub table_name: String,
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DropTableArgs {
    pub table_name: String,
}

/// File formats the engine can import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Parquet,
}

impl FileType {
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(Self::Csv)
        } else if ext.eq_ignore_ascii_case("parquet") {
            Some(Self::Parquet)
        } else {
            None
        }
    }

    /// Input format name for the `file()` table function.
    pub fn clickhouse_format(self) -> &'static str {
        match self {
            Self::Csv => "CSVWithNames",
            Self::Parquet => "Parquet",
        }
    }
}

/// Decode tool arguments; a missing argument object counts as `{}`.
pub fn parse<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, ToolError> {
    let arguments = match arguments {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(value @ Value::Object(_)) => value,
        Some(other) => {
            return Err(ToolError::invalid(format!(
                "expected an object, got {other}"
            )));
        }
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::invalid(e.to_string()))
}

/// Accept `table` or `database.table` made of plain identifiers.
pub fn table_name(name: &str) -> Result<&str, ToolError> {
    let name = name.trim();
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| is_identifier(part)) {
        return Err(ToolError::invalid(format!(
            "'{name}' is not a valid table name (letters, digits and underscores only)"
        )));
    }
    Ok(name)
}

/// A bare `.csv`/`.parquet` file name safe to embed in a quoted SQL literal.
pub fn import_file_name(name: &str) -> Result<(&str, FileType), ToolError> {
    let name = name.trim();
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\'', '"', '\0'])
    {
        return Err(ToolError::invalid(format!(
            "'{name}' is not a plain file name"
        )));
    }
    let file_type = FileType::from_path(name).ok_or_else(|| {
        ToolError::invalid(format!("'{name}' is not a .csv or .parquet file"))
    })?;
    Ok((name, file_type))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_missing_arguments_as_empty_object() {
        let args: ListImportFilesArgs = parse(None).unwrap();
        assert!(args.file_type.is_none());
    }

    #[test]
    fn parse_rejects_non_objects() {
        let err = parse::<DropTableArgs>(Some(json!("orders"))).unwrap_err();
        assert!(err.to_string().contains("expected an object"));
    }

    #[test]
    fn parse_reports_missing_field() {
        let err = parse::<CreateTableArgs>(Some(json!({"table_name": "t"}))).unwrap_err();
        assert!(err.to_string().contains("file_name"));
    }

    #[test]
    fn parse_file_type_filter() {
        let args: ListImportFilesArgs = parse(Some(json!({"file_type": "parquet"}))).unwrap();
        assert_eq!(args.file_type, Some(FileType::Parquet));
        assert!(parse::<ListImportFilesArgs>(Some(json!({"file_type": "xlsx"}))).is_err());
    }

    #[test]
    fn table_names() {
        assert_eq!(table_name(" orders ").unwrap(), "orders");
        assert!(table_name("sales.orders_2024").is_ok());
        assert!(table_name("_tmp").is_ok());
        assert!(table_name("1orders").is_err());
        assert!(table_name("orders; DROP TABLE x").is_err());
        assert!(table_name("a.b.c").is_err());
        assert!(table_name("").is_err());
    }

    #[test]
    fn import_file_names() {
        assert_eq!(
            import_file_name("orders.csv").unwrap(),
            ("orders.csv", FileType::Csv)
        );
        assert_eq!(
            import_file_name("events.PARQUET").unwrap().1,
            FileType::Parquet
        );
        assert!(import_file_name("../etc/passwd.csv").is_err());
        assert!(import_file_name("it's.csv").is_err());
        assert!(import_file_name("notes.txt").is_err());
        assert!(import_file_name("").is_err());
    }

    #[test]
    fn clickhouse_formats() {
        assert_eq!(FileType::Csv.clickhouse_format(), "CSVWithNames");
        assert_eq!(FileType::Parquet.clickhouse_format(), "Parquet");
    }
}
