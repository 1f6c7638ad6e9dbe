//! Pipeline tunables.
//!
//! Mirrors the teacher's `Cli` struct in shape (plain fields, a `Default`
//! impl) but carries pipeline thresholds rather than CLI flags: the HTTP
//! surface's credential and CORS configuration is out of scope for this
//! crate, so there is no env/file loading layer here — callers construct
//! a `PipelineConfig` directly, overriding only what they need.

use std::time::Duration;

/// Tunable thresholds and resource bounds for a scan.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Files at or below this size (bytes) are hashed in full.
    pub hash_threshold_bytes: u64,
    /// Prefix/suffix window (bytes) for the optimized large-file hash.
    pub hash_chunk_bytes: usize,

    /// Minimum containment score for a superset/subset group.
    pub containment_threshold: f64,
    /// Minimum per-chunk cosine similarity to count as "contained".
    pub chunk_similarity_threshold: f64,
    /// Minimum size ratio (larger/smaller) for a superset/subset candidate pair.
    pub size_ratio_threshold: f64,
    /// Sentences per chunk when splitting extracted text.
    pub sentences_per_chunk: usize,
    /// Minimum trimmed text length for superset/subset candidacy.
    pub min_text_length: usize,

    /// Combined-score threshold for clustering text-bearing near duplicates.
    pub near_text_threshold: f64,
    /// Combined-score threshold for clustering non-textual near duplicates.
    pub near_no_text_threshold: f64,
    /// Metadata pre-filter floor below which a pair is never compared further.
    pub metadata_prefilter_floor: f64,

    /// Upper bound on in-flight fetch/process tasks.
    pub max_in_flight_fetches: usize,
    /// Per-request timeout for metadata/listing calls.
    pub metadata_timeout: Duration,
    /// Per-request timeout for content fetch calls.
    pub content_fetch_timeout: Duration,

    /// Identifier of the sentence embedding model to load.
    pub embedding_model_id: String,

    /// Cap on the number of per-file errors surfaced in a scan report.
    pub max_reported_errors: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hash_threshold_bytes: crate::hasher::LARGE_FILE_THRESHOLD,
            hash_chunk_bytes: crate::hasher::CHUNK_SIZE,

            containment_threshold: 0.95,
            chunk_similarity_threshold: 0.98,
            size_ratio_threshold: 1.10,
            sentences_per_chunk: 5,
            min_text_length: 100,

            near_text_threshold: 0.75,
            near_no_text_threshold: 0.85,
            metadata_prefilter_floor: 0.30,

            max_in_flight_fetches: num_cpus::get().clamp(4, 8),
            metadata_timeout: Duration::from_secs(30),
            content_fetch_timeout: Duration::from_secs(120),

            embedding_model_id: "AllMiniLML6V2".to_string(),

            max_reported_errors: 10,
        }
    }
}
