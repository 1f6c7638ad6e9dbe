//! Two-tier content fingerprint.
//!
//! Small files are hashed in full. Files above the threshold are hashed by
//! their first and last chunk plus their size — bounded work per file,
//! independent of how large it is, at the cost of a documented collision
//! class (same-size files sharing prefix and suffix).

use sha2::{Digest, Sha256};

/// Files at or below this size are hashed in full.
pub const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Prefix/suffix window used for the optimized large-file hash.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Computes the two-tier content fingerprint described in the module docs.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    threshold: u64,
    chunk_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self { threshold: LARGE_FILE_THRESHOLD, chunk_size: CHUNK_SIZE }
    }
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a hasher with non-default thresholds, e.g. from a [`crate::config::PipelineConfig`].
    pub fn with_thresholds(threshold: u64, chunk_size: usize) -> Self {
        Self { threshold, chunk_size }
    }

    /// Fingerprints `content`, choosing the full or optimized tier by size.
    pub fn fingerprint(&self, content: &[u8]) -> String {
        let size = content.len() as u64;
        if size <= self.threshold || (content.len()) < self.chunk_size {
            Self::hash_full(content)
        } else {
            self.hash_optimized(content, size)
        }
    }

    fn hash_full(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    fn hash_optimized(&self, content: &[u8], size: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&content[..self.chunk_size]);
        hasher.update(&content[content.len() - self.chunk_size..]);
        hasher.update(size.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_file_hash_is_deterministic() {
        let hasher = Hasher::new();
        let content = b"hello world".to_vec();
        assert_eq!(hasher.fingerprint(&content), hasher.fingerprint(&content));
    }

    #[test]
    fn distinct_small_inputs_hash_differently() {
        let hasher = Hasher::new();
        assert_ne!(hasher.fingerprint(b"hello"), hasher.fingerprint(b"world"));
    }

    #[test]
    fn exactly_at_threshold_uses_full_hash() {
        let hasher = Hasher::new();
        let content = vec![7u8; LARGE_FILE_THRESHOLD as usize];
        let mut sha = Sha256::new();
        sha.update(&content);
        let expected = format!("{:x}", sha.finalize());
        assert_eq!(hasher.fingerprint(&content), expected);
    }

    #[test]
    fn large_files_with_same_prefix_suffix_and_size_collide() {
        let hasher = Hasher::new();
        let size = LARGE_FILE_THRESHOLD as usize + 1024;
        let mut a = vec![0u8; size];
        let mut b = vec![0u8; size];
        // Differ only in the untouched middle bytes.
        a[size / 2] = 1;
        b[size / 2] = 2;
        assert_eq!(hasher.fingerprint(&a), hasher.fingerprint(&b));
    }

    #[test]
    fn large_files_differing_in_prefix_hash_differently() {
        let hasher = Hasher::new();
        let size = LARGE_FILE_THRESHOLD as usize + 1024;
        let mut a = vec![0u8; size];
        let mut b = vec![0u8; size];
        a[0] = 1;
        b[0] = 2;
        assert_ne!(hasher.fingerprint(&a), hasher.fingerprint(&b));
    }

    #[test]
    fn large_files_differing_only_in_size_hash_differently() {
        let hasher = Hasher::new();
        let size = LARGE_FILE_THRESHOLD as usize + 1024;
        let a = vec![0u8; size];
        let b = vec![0u8; size + 1];
        assert_ne!(hasher.fingerprint(&a), hasher.fingerprint(&b));
    }
}
