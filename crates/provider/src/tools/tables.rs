//! Tools that talk to the database.

use std::path::Path;

use serde_json::{Value, json};

use super::ToolError;
use super::args::{self, CreateTableArgs, DropTableArgs, ExecuteQueryArgs};
use crate::database::Database;

pub async fn list_tables<D: Database>(db: &D) -> Result<Value, ToolError> {
    let rows = db.query("SHOW TABLES").await?;
    let names: Vec<&str> = rows
        .rows
        .iter()
        .filter_map(|row| row.get("name").or_else(|| row.values().next()))
        .filter_map(Value::as_str)
        .collect();
    Ok(json!(names))
}

pub async fn execute_query<D: Database>(db: &D, args: ExecuteQueryArgs) -> Result<Value, ToolError> {
    let query = args.query.trim();
    if query.is_empty() {
        return Err(ToolError::invalid("query must not be empty"));
    }

    let rows = db.query(query).await?;
    let row_count = rows.len();
    Ok(json!({
        "columns": rows.columns,
        "rows": rows.rows,
        "row_count": row_count,
    }))
}

pub async fn create_table_from_file<D: Database>(
    db: &D,
    import_dir: &Path,
    args: CreateTableArgs,
) -> Result<Value, ToolError> {
    let table = args::table_name(&args.table_name)?;
    let (file, file_type) = args::import_file_name(&args.file_name)?;

    let present = tokio::fs::metadata(import_dir.join(file))
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !present {
        return Err(ToolError::invalid(format!(
            "file '{file}' is not in the import directory; import it first"
        )));
    }

    let format = file_type.clickhouse_format();
    let sql = format!(
        "CREATE TABLE {table} ENGINE = MergeTree() ORDER BY tuple() AS \
         SELECT * FROM file('{file}', '{format}')"
    );
    db.query(&sql).await?;

    tracing::info!(table, file, "table created");
    Ok(json!({ "table": table, "source_file": file }))
}

pub async fn drop_table<D: Database>(db: &D, args: DropTableArgs) -> Result<Value, ToolError> {
    let table = args::table_name(&args.table_name)?;
    db.query(&format!("DROP TABLE {table}")).await?;

    tracing::info!(table, "table dropped");
    Ok(json!({ "dropped": table }))
}
