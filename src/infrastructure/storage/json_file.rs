//! Whole-document JSON files: atomic replace on write, tolerant reads

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::application::errors::StorageError;

const READ_ATTEMPTS: usize = 3;
const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Sibling path used for the write-then-rename dance
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `value` as pretty JSON to `path` without ever exposing a partial file.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let data = serde_json::to_vec_pretty(value)?;
    let tmp = temp_path(path);

    let result: std::io::Result<()> = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            tracing::debug!("No temp file to clean up at {}: {}", tmp.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}

/// Read a JSON document, tolerating transient and permanent damage.
///
/// - missing file: `Ok(None)`
/// - empty file: retried once after a short pause, then `Ok(None)`
/// - corrupted JSON: retried, then the file is deleted and `Ok(None)`
/// - persistent I/O failure: `Err`
pub async fn read_json_tolerant<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }

    for attempt in 0..READ_ATTEMPTS {
        let last = attempt + 1 == READ_ATTEMPTS;

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::error!("Failed to read {} (attempt {}): {}", path.display(), attempt + 1, e);
                if last {
                    return Err(e.into());
                }
                tokio::time::sleep(RETRY_PAUSE).await;
                continue;
            }
        };

        if content.trim().is_empty() {
            // Another writer may be mid-replace; give it one pause.
            if attempt == 0 {
                tokio::time::sleep(RETRY_PAUSE).await;
                continue;
            }
            return Ok(None);
        }

        match serde_json::from_str(&content) {
            Ok(value) => return Ok(Some(value)),
            Err(e) => {
                tracing::error!("Invalid JSON in {} (attempt {}): {}", path.display(), attempt + 1, e);
                if last {
                    tracing::error!("Discarding corrupted {}; state resets to empty", path.display());
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        tracing::warn!("Could not remove {}: {}", path.display(), e);
                    }
                    return Ok(None);
                }
                tokio::time::sleep(RETRY_PAUSE).await;
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn write_then_read_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        write_json_atomic(&path, &json!({"a": 1})).await.unwrap();

        let value: Option<Value> = read_json_tolerant(&path).await.unwrap();
        assert_eq!(value, Some(json!({"a": 1})));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn missing_and_empty_files_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let missing: Option<Value> = read_json_tolerant(&path).await.unwrap();
        assert!(missing.is_none());

        std::fs::write(&path, "   ").unwrap();
        let empty: Option<Value> = read_json_tolerant(&path).await.unwrap();
        assert!(empty.is_none());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn corrupted_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{not json").unwrap();

        let value: Option<Value> = read_json_tolerant(&path).await.unwrap();
        assert!(value.is_none());
        assert!(!path.exists());
    }
}
