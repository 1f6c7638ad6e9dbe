//! # Redundancy Scanner
//!
//! A duplicate-detection pipeline for cloud file stores. Given a list of root
//! folders reachable through a [`storage::StorageProvider`], the pipeline
//! fetches file bytes, fingerprints and extracts text from them, and runs
//! three detection algorithms — exact-hash grouping, superset/subset
//! containment, and multi-signal near-duplicate clustering — before
//! reconciling their outputs into a single [`ScanReport`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use redundancy_scanner::{PipelineConfig, PipelineOrchestrator, ScanRequest};
//! use redundancy_scanner::storage::LocalFsStorageProvider;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = LocalFsStorageProvider::new();
//!     let orchestrator = PipelineOrchestrator::new(provider, PipelineConfig::default());
//!
//!     let request = ScanRequest {
//!         token: "local".to_string(),
//!         folder_ids: vec!["/path/to/scan".to_string()],
//!         include_subfolders: true,
//!     };
//!
//!     let report = orchestrator.scan(request).await?;
//!     println!("Found {} duplicate groups", report.total_duplicate_groups);
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod deletion;
pub mod detectors;
pub mod embedding;
pub mod hasher;
pub mod orchestrator;
pub mod output;
pub mod storage;
pub mod text_extractor;

pub use config::PipelineConfig;
pub use deletion::{ApproveRequest, ApproveResponse, DeletionExecutor};
pub use embedding::EmbeddingModel;
pub use hasher::Hasher;
pub use orchestrator::PipelineOrchestrator;
pub use output::OutputFormatter;
pub use storage::StorageProvider;

/// A single file as known to the storage provider, enriched by the pipeline.
///
/// Identity, name, size, MIME type, modification time and link are assigned
/// at listing time and never change. `fingerprint` and `extracted_text` are
/// each assigned exactly once, during per-file processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct File {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub last_modified: DateTime<Utc>,
    pub link: String,

    /// Populated by the pipeline after fetching and hashing content.
    pub fingerprint: Option<String>,
    /// Populated by the pipeline after text extraction; absent for non-textual files.
    pub extracted_text: Option<String>,
}

impl File {
    /// A file record straight off a listing call, with pipeline fields unset.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        last_modified: DateTime<Utc>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            last_modified,
            link: link.into(),
            fingerprint: None,
            extracted_text: None,
        }
    }

    pub fn has_text(&self) -> bool {
        self.extracted_text.is_some()
    }
}

/// The kind of relationship a [`DuplicateGroup`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Exact,
    SupersetSubset,
    Near,
}

/// How a [`GroupType::Near`] group was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionMethod {
    #[serde(rename = "content-based")]
    ContentBased,
    #[serde(rename = "filename+metadata")]
    FilenameMetadata,
}

/// One group of redundant files: a primary to keep and duplicates to retire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub group_type: GroupType,
    pub primary_file: File,
    pub duplicate_files: Vec<File>,
    pub similarity_score: f64,
    pub storage_savings_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containment_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_method: Option<DetectionMethod>,
}

impl DuplicateGroup {
    pub fn recompute_savings(&mut self) {
        self.storage_savings_bytes = self.duplicate_files.iter().map(|f| f.size).sum();
    }
}

/// A single-file error encountered during processing; never aborts the scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub file_name: String,
    pub error: String,
}

/// Request shape accepted by [`PipelineOrchestrator::scan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub token: String,
    pub folder_ids: Vec<String>,
    pub include_subfolders: bool,
}

/// Response shape returned by [`PipelineOrchestrator::scan`] on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub status: &'static str,
    pub total_files: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub exact_duplicates: Vec<DuplicateGroup>,
    pub superset_subset_duplicates: Vec<DuplicateGroup>,
    pub near_duplicates: Vec<DuplicateGroup>,
    pub total_duplicate_groups: usize,
    pub total_duplicate_files: usize,
    pub total_storage_savings_bytes: u64,
    pub errors: Vec<FileError>,
}

/// Error kinds surfaced by the pipeline. Scan-global variants abort the scan;
/// per-file failures are instead collected into [`ScanReport::errors`].
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Token rejected by the provider. Caller should prompt re-authentication.
    #[error("authentication expired or invalid: {0}")]
    AuthExpired(String),

    /// Provider failure at the listing level (rate limit, transient network, server error).
    #[error("storage provider error: {0}")]
    ProviderError(String),

    /// Malformed or empty request, rejected before any work starts.
    #[error("invalid scan request: {0}")]
    ValidationError(String),
}

/// Per-file error kinds. These never abort the scan; they are recorded and
/// the file is dropped from whichever stage failed.
///
/// There is no `Hash` variant: `Hasher::fingerprint` is a pure computation
/// over bytes already in hand and cannot fail, so the only per-file failure
/// mode left is the fetch that produces those bytes.
#[derive(thiserror::Error, Debug)]
pub enum FileProcessingError {
    #[error("fetch failed: {0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(id: &str, size: u64) -> File {
        File::new(
            id,
            format!("{id}.txt"),
            size,
            "text/plain",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            format!("https://example.com/{id}"),
        )
    }

    #[test]
    fn file_has_text_reflects_extraction() {
        let mut f = file("a", 10);
        assert!(!f.has_text());
        f.extracted_text = Some("hi".to_string());
        assert!(f.has_text());
    }

    #[test]
    fn group_recompute_savings_sums_duplicate_sizes() {
        let mut group = DuplicateGroup {
            group_type: GroupType::Exact,
            primary_file: file("a", 100),
            duplicate_files: vec![file("b", 50), file("c", 25)],
            similarity_score: 1.0,
            storage_savings_bytes: 0,
            containment_score: None,
            detection_method: None,
        };
        group.recompute_savings();
        assert_eq!(group.storage_savings_bytes, 75);
    }
}
