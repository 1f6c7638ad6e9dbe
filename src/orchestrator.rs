//! Top-level scan coordination: list, process, detect, reconcile, report.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::detectors::{ExactDetector, NearDetector, SupersetDetector};
use crate::embedding::EmbeddingModel;
use crate::hasher::Hasher;
use crate::storage::StorageProvider;
use crate::{DuplicateGroup, File, FileError, FileProcessingError, ScanError, ScanRequest, ScanReport};

static EMBEDDING_MODEL: OnceLock<EmbeddingModel> = OnceLock::new();

/// Coordinates a scan end to end against a [`StorageProvider`].
pub struct PipelineOrchestrator<P: StorageProvider> {
    provider: Arc<P>,
    config: PipelineConfig,
    hasher: Hasher,
    /// Overrides the process-wide lazy singleton when set, so tests (and any
    /// caller that already has a model instance) never trigger a real
    /// `fastembed` load through `scan()`.
    injected_model: Option<EmbeddingModel>,
}

impl<P: StorageProvider + 'static> PipelineOrchestrator<P> {
    pub fn new(provider: P, config: PipelineConfig) -> Self {
        let hasher = Hasher::with_thresholds(config.hash_threshold_bytes, config.hash_chunk_bytes);
        Self { provider: Arc::new(provider), config, hasher, injected_model: None }
    }

    /// Builds an orchestrator that uses `model` instead of the lazily-loaded
    /// process-wide singleton. Intended for tests that want a deterministic,
    /// offline [`EmbeddingModel::degraded`] instance, or for callers that
    /// already hold a loaded model and want to avoid a second load.
    pub fn with_embedding_model(provider: P, config: PipelineConfig, model: EmbeddingModel) -> Self {
        let hasher = Hasher::with_thresholds(config.hash_threshold_bytes, config.hash_chunk_bytes);
        Self { provider: Arc::new(provider), config, hasher, injected_model: Some(model) }
    }

    fn embedding_model(&self) -> &EmbeddingModel {
        self.injected_model.as_ref().unwrap_or_else(|| {
            EMBEDDING_MODEL.get_or_init(|| {
                info!("loading embedding model {}", self.config.embedding_model_id);
                EmbeddingModel::load(&self.config.embedding_model_id)
            })
        })
    }

    /// Runs a full scan: listing, per-file processing, detection, and
    /// cross-detector reconciliation.
    pub async fn scan(&self, request: ScanRequest) -> Result<ScanReport, ScanError> {
        if request.folder_ids.is_empty() {
            return Err(ScanError::ValidationError("folder_ids must not be empty".to_string()));
        }

        info!("Phase 1: listing files");
        let files = tokio::time::timeout(
            self.config.metadata_timeout,
            self.provider.list_files(&request.folder_ids, request.include_subfolders),
        )
        .await
        .map_err(|_| ScanError::ProviderError("listing timed out".to_string()))?
        .map_err(|err| ScanError::ProviderError(err.to_string()))?;
        let total_files = files.len();
        info!("found {total_files} files to process");

        info!("Phase 2: processing files");
        let (processed, errors) = self.process_files(files).await;
        let files_processed = processed.len();
        let files_failed = errors.len();

        info!("Phase 3: running detectors");
        let model = self.embedding_model();

        let exact_duplicates = ExactDetector::detect(&processed);
        let mut superset_subset_duplicates = SupersetDetector::new(model, &self.config).detect(&processed);
        let mut near_duplicates = NearDetector::new(model, &self.config).detect(&processed);

        let mut claimed = claimed_ids(&exact_duplicates);
        reconcile(&mut claimed, &mut superset_subset_duplicates);
        reconcile(&mut claimed, &mut near_duplicates);

        let total_duplicate_groups =
            exact_duplicates.len() + superset_subset_duplicates.len() + near_duplicates.len();
        let total_duplicate_files = exact_duplicates
            .iter()
            .chain(superset_subset_duplicates.iter())
            .chain(near_duplicates.iter())
            .map(|g| g.duplicate_files.len())
            .sum();
        let total_storage_savings_bytes = exact_duplicates
            .iter()
            .chain(superset_subset_duplicates.iter())
            .chain(near_duplicates.iter())
            .map(|g| g.storage_savings_bytes)
            .sum();

        let mut errors = errors;
        errors.truncate(self.config.max_reported_errors);

        info!("scan complete: {total_duplicate_groups} duplicate groups, {total_duplicate_files} duplicate files");

        Ok(ScanReport {
            status: "completed",
            total_files,
            files_processed,
            files_failed,
            exact_duplicates,
            superset_subset_duplicates,
            near_duplicates,
            total_duplicate_groups,
            total_duplicate_files,
            total_storage_savings_bytes,
            errors,
        })
    }

    /// Fetches, hashes, and extracts text for each file, bounded by a
    /// semaphore-gated worker pool. Per-file failures are collected rather
    /// than aborting the scan.
    async fn process_files(&self, files: Vec<File>) -> (Vec<File>, Vec<FileError>) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight_fetches));
        let progress = Arc::new(new_progress_bar(files.len() as u64));
        let mut tasks = Vec::with_capacity(files.len());

        for file in files {
            let semaphore = Arc::clone(&semaphore);
            let provider = Arc::clone(&self.provider);
            let progress = Arc::clone(&progress);
            let hasher = self.hasher;
            let fetch_timeout = self.config.content_fetch_timeout;

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore is never closed");
                let result = process_one_file(provider.as_ref(), hasher, file, fetch_timeout).await;
                progress.inc(1);
                result
            }));
        }

        let mut processed = Vec::new();
        let mut errors = Vec::new();
        for task in tasks {
            match task.await {
                Ok(Ok(file)) => processed.push(file),
                Ok(Err((name, err))) => {
                    warn!("failed to process {name}: {err}");
                    errors.push(FileError { file_name: name, error: err.to_string() });
                }
                Err(join_err) => error!("processing task panicked: {join_err}"),
            }
        }
        progress.finish_with_message("file processing complete");
        (processed, errors)
    }
}

async fn process_one_file<P: StorageProvider + ?Sized>(
    provider: &P,
    hasher: Hasher,
    mut file: File,
    fetch_timeout: std::time::Duration,
) -> Result<File, (String, FileProcessingError)> {
    let bytes = tokio::time::timeout(fetch_timeout, provider.fetch(&file.id))
        .await
        .map_err(|_| (file.name.clone(), FileProcessingError::Provider("fetch timed out".to_string())))?
        .map_err(|err| (file.name.clone(), FileProcessingError::Provider(err.to_string())))?;

    file.fingerprint = Some(hasher.fingerprint(&bytes));
    file.extracted_text = crate::text_extractor::extract(&bytes, &file.mime_type, &file.name)
        .map(|text| crate::text_extractor::normalize(&text));
    // bytes is dropped here, releasing the buffer before the next suspension point.
    debug!("processed {}", file.name);
    Ok(file)
}

fn new_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message("processing files...");
    pb
}

/// Collects every file ID (primary and duplicate) already claimed by `groups`.
fn claimed_ids(groups: &[DuplicateGroup]) -> HashSet<String> {
    let mut claimed = HashSet::new();
    for group in groups {
        claimed.insert(group.primary_file.id.clone());
        for dup in &group.duplicate_files {
            claimed.insert(dup.id.clone());
        }
    }
    claimed
}

/// Drops groups (or members) of a lower-precedence detector tier whose files
/// are already claimed by a higher-precedence tier, recomputes savings for
/// the survivors, and extends `claimed` with this tier's own IDs so a later
/// call sees both. Tiers run in precedence order: exact, then superset/subset,
/// then near — a file settled by an earlier tier never reappears in a later one.
fn reconcile(claimed: &mut HashSet<String>, groups: &mut Vec<DuplicateGroup>) {
    groups.retain_mut(|group| {
        if claimed.contains(group.primary_file.id.as_str()) {
            return false;
        }
        group.duplicate_files.retain(|dup| !claimed.contains(dup.id.as_str()));
        if group.duplicate_files.is_empty() {
            return false;
        }
        group.recompute_savings();
        true
    });
    claimed.extend(claimed_ids(groups));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn file(id: &str) -> File {
        File::new(id, format!("{id}.txt"), 100, "text/plain", ts(1), format!("link/{id}"))
    }

    fn group(group_type: crate::GroupType, primary: &str, dup: &str) -> DuplicateGroup {
        DuplicateGroup {
            group_type,
            primary_file: file(primary),
            duplicate_files: vec![file(dup)],
            similarity_score: 1.0,
            storage_savings_bytes: 100,
            containment_score: None,
            detection_method: None,
        }
    }

    #[test]
    fn reconcile_drops_near_group_whose_primary_is_claimed() {
        let exact = vec![group(crate::GroupType::Exact, "a", "b")];
        let mut claimed = claimed_ids(&exact);
        let mut near = vec![group(crate::GroupType::Near, "a", "c")];

        reconcile(&mut claimed, &mut near);
        assert!(near.is_empty());
    }

    #[test]
    fn reconcile_strips_claimed_duplicates_and_keeps_survivors() {
        let exact = vec![group(crate::GroupType::Exact, "a", "b")];
        let mut claimed = claimed_ids(&exact);
        let mut near_group = group(crate::GroupType::Near, "x", "b");
        near_group.duplicate_files.push(file("y"));
        near_group.storage_savings_bytes = 200;
        let mut near = vec![near_group];

        reconcile(&mut claimed, &mut near);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].duplicate_files.len(), 1);
        assert_eq!(near[0].duplicate_files[0].id, "y");
        assert_eq!(near[0].storage_savings_bytes, 100);
    }

    #[test]
    fn reconcile_drops_superset_group_whose_duplicate_is_claimed_by_exact() {
        // Mirrors the spec's cross-detector scenario: A and B are exact
        // duplicates; a superset detector also matches B inside a larger C.
        // B must not appear in both the exact and the superset group.
        let exact = vec![group(crate::GroupType::Exact, "a", "b")];
        let mut claimed = claimed_ids(&exact);
        let mut superset = vec![group(crate::GroupType::SupersetSubset, "c", "b")];

        reconcile(&mut claimed, &mut superset);
        assert!(superset.is_empty());
    }

    #[tokio::test]
    async fn scan_rejects_empty_folder_list() {
        let orchestrator = PipelineOrchestrator::new(
            crate::storage::MemoryStorageProvider::new(),
            PipelineConfig::default(),
        );
        let request = ScanRequest {
            token: "t".to_string(),
            folder_ids: vec![],
            include_subfolders: false,
        };
        let result = orchestrator.scan(request).await;
        assert!(matches!(result, Err(ScanError::ValidationError(_))));
    }

    #[tokio::test]
    async fn scan_finds_exact_duplicates_end_to_end() {
        let provider = crate::storage::MemoryStorageProvider::new();
        provider.add_file(
            File::new("a", "a.txt", 11, "text/plain", ts(1), "/a.txt"),
            b"hello world".to_vec(),
        );
        provider.add_file(
            File::new("b", "b.txt", 11, "text/plain", ts(2), "/b.txt"),
            b"hello world".to_vec(),
        );

        let orchestrator = PipelineOrchestrator::with_embedding_model(
            provider,
            PipelineConfig::default(),
            EmbeddingModel::degraded(),
        );
        let request = ScanRequest {
            token: "t".to_string(),
            folder_ids: vec!["/".to_string()],
            include_subfolders: true,
        };
        let report = orchestrator.scan(request).await.unwrap();

        assert_eq!(report.files_processed, 2);
        assert_eq!(report.exact_duplicates.len(), 1);
        assert_eq!(report.total_storage_savings_bytes, 11);
    }
}
