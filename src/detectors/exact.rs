//! Groups files sharing a content fingerprint.

use std::collections::HashMap;

use crate::{DuplicateGroup, File, GroupType};

/// Exact-duplicate detector: buckets files by fingerprint.
pub struct ExactDetector;

impl ExactDetector {
    /// Groups `files` by fingerprint. Files with no fingerprint (failed
    /// processing) are ignored. Within each bucket of 2+, the earliest file
    /// by `(last_modified, name)` becomes primary.
    pub fn detect(files: &[File]) -> Vec<DuplicateGroup> {
        let mut buckets: HashMap<&str, Vec<&File>> = HashMap::new();
        for file in files {
            if let Some(fingerprint) = file.fingerprint.as_deref() {
                buckets.entry(fingerprint).or_default().push(file);
            }
        }

        buckets
            .into_values()
            .filter(|bucket| bucket.len() >= 2)
            .map(|mut bucket| {
                bucket.sort_by(|a, b| {
                    a.last_modified
                        .cmp(&b.last_modified)
                        .then_with(|| a.name.cmp(&b.name))
                });
                let mut members = bucket.into_iter();
                let primary = members.next().expect("bucket has at least 2 members").clone();
                let duplicates: Vec<File> = members.cloned().collect();

                let mut group = DuplicateGroup {
                    group_type: GroupType::Exact,
                    primary_file: primary,
                    duplicate_files: duplicates,
                    similarity_score: 1.0,
                    storage_savings_bytes: 0,
                    containment_score: None,
                    detection_method: None,
                };
                group.recompute_savings();
                group
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn file(id: &str, fingerprint: &str, size: u64, modified: DateTime<Utc>) -> File {
        let mut f = File::new(id, format!("{id}.bin"), size, "application/octet-stream", modified, format!("link/{id}"));
        f.fingerprint = Some(fingerprint.to_string());
        f
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn groups_files_sharing_a_fingerprint() {
        let files = vec![
            file("a", "hash1", 2048, ts(1)),
            file("b", "hash1", 2048, ts(2)),
            file("c", "hash1", 2048, ts(3)),
            file("d", "hash2", 999, ts(1)),
        ];

        let groups = ExactDetector::detect(&files);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.primary_file.id, "a");
        assert_eq!(group.duplicate_files.len(), 2);
        assert_eq!(group.similarity_score, 1.0);
        assert_eq!(group.storage_savings_bytes, 2048 * 2);
    }

    #[test]
    fn ties_broken_by_name_when_timestamps_match() {
        let files = vec![
            file("zeta", "hash1", 10, ts(1)),
            file("alpha", "hash1", 10, ts(1)),
        ];
        let groups = ExactDetector::detect(&files);
        assert_eq!(groups[0].primary_file.id, "alpha");
    }

    #[test]
    fn singleton_buckets_produce_no_group() {
        let files = vec![file("a", "hash1", 10, ts(1))];
        assert!(ExactDetector::detect(&files).is_empty());
    }

    #[test]
    fn files_without_a_fingerprint_are_ignored() {
        let mut f = file("a", "hash1", 10, ts(1));
        f.fingerprint = None;
        let other = file("b", "hash1", 10, ts(2));
        assert!(ExactDetector::detect(&[f, other]).is_empty());
    }
}
