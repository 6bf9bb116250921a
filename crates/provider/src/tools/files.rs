//! Tools that manage the import directory.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use super::ToolError;
use super::args::{self, FileType, ImportFileArgs, ListImportFilesArgs};

pub async fn list_import_files(
    import_dir: &Path,
    args: ListImportFilesArgs,
) -> Result<Value, ToolError> {
    let context = || format!("reading {}", import_dir.display());
    let mut entries = tokio::fs::read_dir(import_dir)
        .await
        .map_err(ToolError::io(context()))?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(ToolError::io(context()))? {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let Some(file_type) = FileType::from_path(&name) else {
            continue;
        };
        if args.file_type.is_none_or(|wanted| wanted == file_type) {
            names.push(name);
        }
    }

    names.sort();
    Ok(json!(names))
}

pub async fn import_file(import_dir: &Path, args: ImportFileArgs) -> Result<Value, ToolError> {
    let source = PathBuf::from(args.source_path.trim());
    if FileType::from_path(&source).is_none() {
        return Err(ToolError::invalid(format!(
            "'{}' is not a .csv or .parquet file",
            source.display()
        )));
    }

    let destination_name = match &args.destination_name {
        Some(name) => name.clone(),
        None => source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| ToolError::invalid("source path has no file name"))?,
    };
    let (destination_name, _) = args::import_file_name(&destination_name)?;

    tokio::fs::create_dir_all(import_dir)
        .await
        .map_err(ToolError::io(format!("creating {}", import_dir.display())))?;

    let destination = import_dir.join(destination_name);
    let bytes = tokio::fs::copy(&source, &destination)
        .await
        .map_err(ToolError::io(format!(
            "copying {} to {}",
            source.display(),
            destination.display()
        )))?;

    tracing::info!(source = %source.display(), destination = %destination.display(), bytes, "file imported");
    Ok(json!({
        "destination": destination.display().to_string(),
        "file_name": destination_name,
        "bytes": bytes,
    }))
}
