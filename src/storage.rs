//! Result files: `<dir>/<task_id>.json`.
//!
//! Writes are atomic: the JSON goes to a temporary file in the target
//! directory which is then renamed over the final path, so a reader never
//! sees a half-written result and an interrupted run leaves the previous
//! file intact.

use crate::error::DocServeError;
use crate::task::{validate_task_id, ConversionResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Path of the result file for `task_id` inside `dir`.
pub fn result_path(dir: impl AsRef<Path>, task_id: &str) -> Result<PathBuf, DocServeError> {
    validate_task_id(task_id)?;
    Ok(dir.as_ref().join(format!("{task_id}.json")))
}

/// Write `result` as pretty JSON to `<dir>/<task_id>.json`, creating `dir`.
pub async fn save_result(
    dir: impl AsRef<Path>,
    task_id: &str,
    result: &ConversionResult,
) -> Result<PathBuf, DocServeError> {
    let dir = dir.as_ref().to_path_buf();
    let path = result_path(&dir, task_id)?;

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| DocServeError::ResultWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    let json = serde_json::to_vec_pretty(result).map_err(|e| DocServeError::ResultWriteFailed {
        path: path.clone(),
        source: e.into(),
    })?;

    let target = path.clone();
    tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &json))
        .await
        .map_err(|e| DocServeError::ResultWriteFailed {
            path: path.clone(),
            source: std::io::Error::other(format!("write task panicked: {e}")),
        })??;

    info!(
        "Saved {} chunks for task {} to {}",
        result.chunk_count(),
        task_id,
        path.display()
    );
    Ok(path)
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), DocServeError> {
    let fail = |source: std::io::Error| DocServeError::ResultWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.write_all(b"\n").map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    debug!("Persisted {} bytes to {}", bytes.len() + 1, path.display());
    Ok(())
}

/// Read a result file written by [`save_result`].
pub async fn load_result(path: impl AsRef<Path>) -> Result<ConversionResult, DocServeError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DocServeError::ResultReadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    serde_json::from_slice(&bytes).map_err(|e| DocServeError::ResultReadFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Chunk;
    use serde_json::json;

    fn sample() -> ConversionResult {
        serde_json::from_value(json!({
            "chunks": [
                {"text": "Docling Technical Report. Abstract: this report introduces…",
                 "metadata": {"page": 1, "bbox": {"l": 10.0, "t": 20.0, "r": 200.0, "b": 40.0}}},
                {"text": "1 Introduction", "metadata": {"page": 1}},
                {"text": "Tables and figures", "metadata": {}}
            ],
            "processing_time": 3.2
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn save_then_load_keeps_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let original = sample();

        let path = save_result(dir.path(), "task-42", &original).await.unwrap();
        assert_eq!(path, dir.path().join("task-42.json"));

        let loaded = load_result(&path).await.unwrap();
        assert_eq!(loaded.chunk_count(), original.chunk_count());
        assert_eq!(loaded.preview(20), original.preview(20));
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn save_creates_missing_directories_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");

        save_result(&nested, "t", &sample()).await.unwrap();
        let replacement = ConversionResult::new(vec![Chunk::new("only")]);
        let path = save_result(&nested, "t", &replacement).await.unwrap();

        let loaded = load_result(&path).await.unwrap();
        assert_eq!(loaded.chunk_count(), 1);
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn bad_task_id_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_result(dir.path(), "../escape", &sample()).await.unwrap_err();
        assert!(matches!(err, DocServeError::InvalidTaskId { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn load_rejects_non_result_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        std::fs::write(&path, b"{\"not\": \"a result\"}").unwrap();
        let err = load_result(&path).await.unwrap_err();
        assert!(matches!(err, DocServeError::ResultReadFailed { .. }));
    }
}
