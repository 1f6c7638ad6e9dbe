//! Storage backends the pipeline can list, fetch from, and delete through.
//!
//! [`StorageProvider`] is the seam a real cloud file-store client (Graph,
//! Drive, S3-compatible buckets, ...) would implement. This crate ships
//! [`LocalFsStorageProvider`], which adapts the directory-traversal approach
//! from a plain filesystem scanner to the async trait, so the pipeline is
//! exercisable end to end without any cloud credentials, plus
//! [`MemoryStorageProvider`], an in-memory test double.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::File;

/// Abstraction over a cloud (or local) file store.
///
/// Implementors need not be `Send + Sync` free of interior mutability; the
/// orchestrator only ever holds a provider behind an `Arc`.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Lists files reachable from `folder_ids`, recursing into subfolders
    /// when `include_subfolders` is set. Order is not guaranteed.
    async fn list_files(
        &self,
        folder_ids: &[String],
        include_subfolders: bool,
    ) -> anyhow::Result<Vec<File>>;

    /// Fetches the full byte content of a single file by id.
    async fn fetch(&self, file_id: &str) -> anyhow::Result<Vec<u8>>;

    /// Removes a file. `soft` requests a reversible delete (trash/recycle
    /// bin) where the backend supports one; providers that can't honor a
    /// soft delete may fall back to a hard delete and should document it.
    async fn delete(&self, file_id: &str, soft: bool) -> anyhow::Result<()>;
}

/// Lists and fetches files from the real filesystem, using `folder_ids` as
/// root paths. Symlinks are not followed and each canonicalized directory is
/// visited at most once, which is the local stand-in for the cycle defense a
/// cloud provider's shortcut/symlink-equivalent entries would otherwise need.
pub struct LocalFsStorageProvider {
    /// Directory soft-deleted files are moved into, created lazily per root.
    trash_dir_name: String,
}

impl LocalFsStorageProvider {
    pub fn new() -> Self {
        Self {
            trash_dir_name: ".redundancy-scanner-trash".to_string(),
        }
    }

    async fn discover_files(&self, roots: &[String], recurse: bool) -> anyhow::Result<Vec<File>> {
        let mut files = Vec::new();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut dir_stack: Vec<(PathBuf, usize)> =
            roots.iter().map(|root| (PathBuf::from(root), 0)).collect();

        const MAX_PENDING_DIRS: usize = 10_000;

        while let Some((dir, depth)) = dir_stack.pop() {
            if dir_stack.len() > MAX_PENDING_DIRS {
                warn!("too many pending directories ({}), stopping scan early", dir_stack.len());
                break;
            }
            if depth > 0 && !recurse {
                continue;
            }
            if dir.file_name().map(|n| n == self.trash_dir_name.as_str()).unwrap_or(false) {
                continue;
            }

            let canonical = match tokio::fs::canonicalize(&dir).await {
                Ok(path) => path,
                Err(err) => {
                    warn!("cannot resolve {}: {err}", dir.display());
                    continue;
                }
            };
            if !visited.insert(canonical) {
                debug!("already visited {}, skipping", dir.display());
                continue;
            }

            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("cannot read directory {}: {err}", dir.display());
                    continue;
                }
            };

            let mut subdirs = Vec::new();
            while let Some(entry) = entries.next_entry().await.transpose() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!("error reading entry in {}: {err}", dir.display());
                        continue;
                    }
                };
                let path = entry.path();
                if path.is_symlink() {
                    continue;
                }

                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        warn!("cannot stat {}: {err}", path.display());
                        continue;
                    }
                };

                if metadata.is_dir() {
                    subdirs.push((path, depth + 1));
                } else if metadata.is_file() && metadata.len() > 0 {
                    files.push(path_to_file(&path, metadata.len(), metadata.modified().ok()));
                }
            }

            for subdir in subdirs.into_iter().rev() {
                dir_stack.push(subdir);
            }
        }

        Ok(files)
    }
}

impl Default for LocalFsStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn path_to_file(path: &Path, size: u64, modified: Option<std::time::SystemTime>) -> File {
    let last_modified: DateTime<Utc> = modified.map(DateTime::from).unwrap_or_else(Utc::now);
    let mime_type = mime_guess_from_extension(path);
    File::new(
        path.to_string_lossy().to_string(),
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        size,
        mime_type,
        last_modified,
        path.to_string_lossy().to_string(),
    )
}

fn mime_guess_from_extension(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "ppt" => "application/vnd.ms-powerpoint",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl StorageProvider for LocalFsStorageProvider {
    async fn list_files(
        &self,
        folder_ids: &[String],
        include_subfolders: bool,
    ) -> anyhow::Result<Vec<File>> {
        self.discover_files(folder_ids, include_subfolders).await
    }

    async fn fetch(&self, file_id: &str) -> anyhow::Result<Vec<u8>> {
        Ok(tokio::fs::read(file_id).await?)
    }

    async fn delete(&self, file_id: &str, soft: bool) -> anyhow::Result<()> {
        let path = Path::new(file_id);
        if !soft {
            return Ok(tokio::fs::remove_file(path).await?);
        }

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let trash_dir = parent.join(&self.trash_dir_name);
        tokio::fs::create_dir_all(&trash_dir).await?;
        let file_name = path.file_name().ok_or_else(|| anyhow::anyhow!("no file name in {file_id}"))?;
        tokio::fs::rename(path, trash_dir.join(file_name)).await?;
        Ok(())
    }
}

/// In-memory provider for tests: files and content live in a `Mutex`-guarded
/// map, deletes are recorded rather than destructive.
pub struct MemoryStorageProvider {
    files: Mutex<Vec<File>>,
    content: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<(String, bool)>>,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(Vec::new()),
            content: Mutex::new(std::collections::HashMap::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn add_file(&self, file: File, content: Vec<u8>) {
        self.content.lock().unwrap().insert(file.id.clone(), content);
        self.files.lock().unwrap().push(file);
    }

    pub fn deleted_ids(&self) -> Vec<(String, bool)> {
        self.deleted.lock().unwrap().clone()
    }
}

impl Default for MemoryStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorageProvider {
    async fn list_files(
        &self,
        folder_ids: &[String],
        _include_subfolders: bool,
    ) -> anyhow::Result<Vec<File>> {
        if folder_ids.is_empty() {
            return Ok(self.files.lock().unwrap().clone());
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|f| folder_ids.iter().any(|root| f.link.starts_with(root)))
            .cloned()
            .collect())
    }

    async fn fetch(&self, file_id: &str) -> anyhow::Result<Vec<u8>> {
        self.content
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such file: {file_id}"))
    }

    async fn delete(&self, file_id: &str, soft: bool) -> anyhow::Result<()> {
        self.deleted.lock().unwrap().push((file_id.to_string(), soft));
        Ok(())
    }
}
