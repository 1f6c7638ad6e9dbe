//! Batched deletion against a [`StorageProvider`], with per-file error capture.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::storage::StorageProvider;
use crate::FileError;

/// Request shape for approving a deletion batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub token: String,
    pub group_id: String,
    pub file_ids: Vec<String>,
    pub permanent: bool,
}

/// Response shape returned after a deletion batch completes (or is cancelled).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveResponse {
    pub status: &'static str,
    pub deleted_files: Vec<String>,
    pub errors: Vec<FileError>,
    pub permanent: bool,
    pub message: String,
}

/// Executes a deletion batch against a storage provider.
pub struct DeletionExecutor<P: StorageProvider> {
    provider: std::sync::Arc<P>,
}

impl<P: StorageProvider> DeletionExecutor<P> {
    pub fn new(provider: std::sync::Arc<P>) -> Self {
        Self { provider }
    }

    /// Deletes each file in `request.file_ids` in sequence. A failure on one
    /// file does not abort the batch. `cancelled` is polled between files;
    /// when it returns `true` the batch stops and the partial results
    /// collected so far are returned.
    pub async fn execute(
        &self,
        request: ApproveRequest,
        mut cancelled: impl FnMut() -> bool,
    ) -> ApproveResponse {
        let mut deleted_files = Vec::new();
        let mut errors = Vec::new();

        for file_id in &request.file_ids {
            if cancelled() {
                info!("deletion batch cancelled after {} of {} files", deleted_files.len(), request.file_ids.len());
                break;
            }

            // `permanent` is the caller-facing flag; `StorageProvider::delete`'s
            // `soft` parameter is its inverse (soft = reversible trash move).
            match self.provider.delete(file_id, !request.permanent).await {
                Ok(()) => {
                    deleted_files.push(file_id.clone());
                }
                Err(err) => {
                    warn!("failed to delete {file_id}: {err}");
                    errors.push(FileError {
                        file_name: file_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        if !errors.is_empty() {
            error!("deletion batch for group {} had {} failures", request.group_id, errors.len());
        }

        let message = if errors.is_empty() {
            format!("deleted {} file(s)", deleted_files.len())
        } else {
            format!("deleted {} file(s), {} failed", deleted_files.len(), errors.len())
        };

        ApproveResponse {
            status: "completed",
            deleted_files,
            errors,
            permanent: request.permanent,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorageProvider;
    use crate::File;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn sample_file(id: &str) -> File {
        File::new(
            id,
            format!("{id}.txt"),
            10,
            "text/plain",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            format!("/{id}.txt"),
        )
    }

    #[tokio::test]
    async fn deletes_all_requested_files() {
        let provider = Arc::new(MemoryStorageProvider::new());
        provider.add_file(sample_file("a"), b"1".to_vec());
        provider.add_file(sample_file("b"), b"2".to_vec());

        let executor = DeletionExecutor::new(Arc::clone(&provider));
        let request = ApproveRequest {
            token: "t".to_string(),
            group_id: "g1".to_string(),
            file_ids: vec!["a".to_string(), "b".to_string()],
            permanent: false,
        };

        let response = executor.execute(request, || false).await;
        assert_eq!(response.deleted_files, vec!["a", "b"]);
        assert!(response.errors.is_empty());
        assert!(!response.permanent);
    }

    #[tokio::test]
    async fn stops_at_next_file_boundary_when_cancelled() {
        let provider = Arc::new(MemoryStorageProvider::new());
        provider.add_file(sample_file("a"), b"1".to_vec());
        provider.add_file(sample_file("b"), b"2".to_vec());
        provider.add_file(sample_file("c"), b"3".to_vec());

        let executor = DeletionExecutor::new(Arc::clone(&provider));
        let request = ApproveRequest {
            token: "t".to_string(),
            group_id: "g1".to_string(),
            file_ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            permanent: true,
        };

        let mut calls = 0;
        let response = executor
            .execute(request, || {
                calls += 1;
                calls > 1
            })
            .await;

        assert_eq!(response.deleted_files, vec!["a"]);
    }

    #[tokio::test]
    async fn permanent_false_leaves_file_recoverable_in_trash() {
        use crate::storage::LocalFsStorageProvider;

        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("doc.txt");
        tokio::fs::write(&file_path, b"content").await.unwrap();

        let provider = Arc::new(LocalFsStorageProvider::new());
        let executor = DeletionExecutor::new(Arc::clone(&provider));
        let request = ApproveRequest {
            token: "t".to_string(),
            group_id: "g1".to_string(),
            file_ids: vec![file_path.to_string_lossy().to_string()],
            permanent: false,
        };

        let response = executor.execute(request, || false).await;
        assert!(response.errors.is_empty());
        assert!(!file_path.exists());
        let trashed = dir.path().join(".redundancy-scanner-trash").join("doc.txt");
        assert!(trashed.exists(), "permanent=false must leave the file recoverable in trash");
    }

    #[tokio::test]
    async fn permanent_true_removes_file_outright() {
        use crate::storage::LocalFsStorageProvider;

        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("doc.txt");
        tokio::fs::write(&file_path, b"content").await.unwrap();

        let provider = Arc::new(LocalFsStorageProvider::new());
        let executor = DeletionExecutor::new(Arc::clone(&provider));
        let request = ApproveRequest {
            token: "t".to_string(),
            group_id: "g1".to_string(),
            file_ids: vec![file_path.to_string_lossy().to_string()],
            permanent: true,
        };

        let response = executor.execute(request, || false).await;
        assert!(response.errors.is_empty());
        assert!(!file_path.exists());
        let trashed = dir.path().join(".redundancy-scanner-trash").join("doc.txt");
        assert!(!trashed.exists(), "permanent=true must not leave a recoverable trash copy");
    }
}
