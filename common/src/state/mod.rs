//! Atomic JSON-file persistence helpers shared by the registry, the query
//! trace store, and the incident/memory stores. The modality-state file is
//! the single source of truth (spec.md §5): readers never hold it open
//! across awaits, and writers always go through `write_json_atomic`.

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

/// Writes `value` to `path` atomically: serialize to a sibling `.tmp` file,
/// flush, then `rename` over the destination. A crash mid-write can never
/// leave a torn file at `path`.
pub async fn write_json_atomic<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Reads and deserializes `path`, returning `T::default()` when the file
/// does not exist yet.
pub async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, AppError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(AppError::Io(err)),
    }
}

/// Appends a single JSON-encoded line to `path`, creating it if absent.
/// Used for the append-only query-trace and incident-candidate logs.
pub async fn append_jsonl<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

/// Reads every line of a JSON-lines file, skipping lines that fail to parse
/// (logged by the caller) rather than aborting the whole read.
pub async fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AppError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(AppError::Io(err)),
    }
}
