//! Weighted multi-signal near-duplicate clustering.

use crate::config::PipelineConfig;
use crate::embedding::{fallback_composite_similarity, EmbeddingModel};
use crate::{DetectionMethod, DuplicateGroup, File, GroupType};

/// Near-duplicate detector: two-pass clustering over text-bearing and
/// non-textual files, each with its own threshold and signal mix.
pub struct NearDetector<'a> {
    model: &'a EmbeddingModel,
    config: &'a PipelineConfig,
}

impl<'a> NearDetector<'a> {
    pub fn new(model: &'a EmbeddingModel, config: &'a PipelineConfig) -> Self {
        Self { model, config }
    }

    pub fn detect(&self, files: &[File]) -> Vec<DuplicateGroup> {
        let (textual, non_textual): (Vec<&File>, Vec<&File>) =
            files.iter().partition(|f| f.has_text());

        let mut groups = self.cluster(&textual, true, self.config.near_text_threshold);
        groups.extend(self.cluster(&non_textual, false, self.config.near_no_text_threshold));
        groups
    }

    fn cluster(&self, files: &[&File], use_content: bool, threshold: f64) -> Vec<DuplicateGroup> {
        let mut clustered = vec![false; files.len()];
        let mut groups = Vec::new();

        for i in 0..files.len() {
            if clustered[i] {
                continue;
            }

            let mut member_indices = vec![i];
            for j in (i + 1)..files.len() {
                if clustered[j] {
                    continue;
                }
                let metadata = metadata_similarity(files[i], files[j]);
                if metadata < self.config.metadata_prefilter_floor {
                    continue;
                }

                let filename_sim = self.model.filename_similarity(&files[i].name, &files[j].name);
                let combined = if use_content {
                    let content_sim = match (&files[i].extracted_text, &files[j].extracted_text) {
                        (Some(a), Some(b)) => {
                            self.model.similarity(&crate::text_extractor::normalize(a), &crate::text_extractor::normalize(b))
                        }
                        _ => 0.0,
                    };
                    if content_sim > 0.0 {
                        0.5 * content_sim + 0.3 * filename_sim + 0.2 * metadata
                    } else {
                        0.6 * filename_sim + 0.4 * metadata
                    }
                } else {
                    0.6 * filename_sim + 0.4 * metadata
                };

                if combined >= threshold {
                    member_indices.push(j);
                }
            }

            if member_indices.len() < 2 {
                continue;
            }

            for &idx in &member_indices {
                clustered[idx] = true;
            }

            let primary = files[member_indices[0]];
            let duplicates: Vec<File> = member_indices[1..].iter().map(|&idx| files[idx].clone()).collect();

            let similarity_score = if use_content {
                let sum: f64 = duplicates
                    .iter()
                    .map(|dup| self.plain_combined_score(primary, dup))
                    .sum();
                sum / duplicates.len() as f64
            } else {
                threshold
            };

            let mut group = DuplicateGroup {
                group_type: GroupType::Near,
                primary_file: primary.clone(),
                duplicate_files: duplicates,
                similarity_score,
                storage_savings_bytes: 0,
                containment_score: None,
                detection_method: Some(if use_content {
                    DetectionMethod::ContentBased
                } else {
                    DetectionMethod::FilenameMetadata
                }),
            };
            group.recompute_savings();
            groups.push(group);
        }

        groups
    }

    /// Recomputes the combined score between `primary` and `member` using the
    /// cheaper plain (non-embedding) filename similarity, matching the
    /// averaging step's reliance on the plain formula rather than the
    /// semantic one used during clustering.
    fn plain_combined_score(&self, primary: &File, member: &File) -> f64 {
        let metadata = metadata_similarity(primary, member);
        let filename_sim = fallback_composite_similarity(&primary.name, &member.name);
        let content_sim = match (&primary.extracted_text, &member.extracted_text) {
            (Some(a), Some(b)) => self
                .model
                .similarity(&crate::text_extractor::normalize(a), &crate::text_extractor::normalize(b)),
            _ => 0.0,
        };
        if content_sim > 0.0 {
            0.5 * content_sim + 0.3 * filename_sim + 0.2 * metadata
        } else {
            0.6 * filename_sim + 0.4 * metadata
        }
    }
}

/// Metadata similarity in `[0, 1]`: size-ratio band + modification-day
/// proximity + MIME-type match.
pub fn metadata_similarity(a: &File, b: &File) -> f64 {
    let mut score: f64 = 0.0;

    let (min_size, max_size) = if a.size < b.size { (a.size, b.size) } else { (b.size, a.size) };
    if max_size > 0 {
        let ratio = min_size as f64 / max_size as f64;
        if ratio >= 0.9 {
            score += 0.5;
        } else if ratio >= 0.8 {
            score += 0.3;
        }
    }

    let day_delta = (a.last_modified - b.last_modified).num_days().unsigned_abs();
    if day_delta == 0 {
        score += 0.3;
    } else if day_delta <= 7 {
        score += 0.2;
    } else if day_delta <= 30 {
        score += 0.1;
    }

    if a.mime_type == b.mime_type {
        score += 0.2;
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn file(id: &str, name: &str, size: u64, mime: &str, modified: DateTime<Utc>) -> File {
        File::new(id, name, size, mime, modified, format!("link/{id}"))
    }

    #[test]
    fn metadata_similarity_is_symmetric_and_bounded() {
        let a = file("a", "a.jpg", 1000, "image/jpeg", ts(5));
        let b = file("b", "b.jpg", 950, "image/jpeg", ts(6));
        let forward = metadata_similarity(&a, &b);
        let backward = metadata_similarity(&b, &a);
        assert_eq!(forward, backward);
        assert!((0.0..=1.0).contains(&forward));
    }

    #[test]
    fn metadata_similarity_rewards_same_day_same_mime_close_size() {
        let a = file("a", "a.jpg", 1000, "image/jpeg", ts(5));
        let b = file("b", "b.jpg", 980, "image/jpeg", ts(5));
        assert_eq!(metadata_similarity(&a, &b), 1.0);
    }

    #[test]
    fn non_textual_cluster_uses_fixed_threshold_score() {
        let config = PipelineConfig::default();
        let model = EmbeddingModel::degraded();
        let detector = NearDetector::new(&model, &config);

        let a = file("a", "vacation_photo_001.jpg", 2_000_000, "image/jpeg", ts(5));
        let b = file("b", "vacation_photo_002.jpg", 1_980_000, "image/jpeg", ts(5));

        let groups = detector.cluster(&[&a, &b], false, config.near_no_text_threshold);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].similarity_score, config.near_no_text_threshold);
        assert_eq!(groups[0].detection_method, Some(DetectionMethod::FilenameMetadata));
    }

    #[test]
    fn dissimilar_files_do_not_cluster() {
        let config = PipelineConfig::default();
        let model = EmbeddingModel::degraded();
        let detector = NearDetector::new(&model, &config);

        let a = file("a", "budget_2024.xlsx", 50_000, "application/vnd.ms-excel", ts(1));
        let b = file("b", "vacation_photo.jpg", 2_000_000, "image/jpeg", ts(200));

        let groups = detector.cluster(&[&a, &b], false, config.near_no_text_threshold);
        assert!(groups.is_empty());
    }

    #[test]
    fn textual_cluster_sets_content_based_method() {
        let config = PipelineConfig::default();
        let model = EmbeddingModel::degraded();
        let detector = NearDetector::new(&model, &config);

        let mut a = file("a", "quarterly_report_draft.txt", 10_000, "text/plain", ts(5));
        a.extracted_text = Some("the quarterly results show strong growth across all regions".to_string());
        let mut b = file("b", "quarterly_report_final.txt", 10_200, "text/plain", ts(5));
        b.extracted_text = Some("the quarterly results show strong growth across all regions".to_string());

        let groups = detector.cluster(&[&a, &b], true, config.near_text_threshold);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].detection_method, Some(DetectionMethod::ContentBased));
        assert!(groups[0].similarity_score >= config.near_text_threshold * 0.5);
    }
}
