//! Sentence-chunked asymmetric containment detection.
//!
//! Containment answers "is the smaller file's text substantially a subset of
//! the larger file's text?" by chunking both into short sentence groups,
//! embedding them, and checking how many of the smaller file's chunks have a
//! close match somewhere in the larger file.

use regex::Regex;

use crate::config::PipelineConfig;
use crate::embedding::{cosine_similarity, EmbeddingModel};
use crate::{DuplicateGroup, File, GroupType};

/// Superset/subset detector: pairwise asymmetric containment over text chunks.
pub struct SupersetDetector<'a> {
    model: &'a EmbeddingModel,
    config: &'a PipelineConfig,
}

impl<'a> SupersetDetector<'a> {
    pub fn new(model: &'a EmbeddingModel, config: &'a PipelineConfig) -> Self {
        Self { model, config }
    }

    pub fn detect(&self, files: &[File]) -> Vec<DuplicateGroup> {
        let candidates: Vec<&File> = files
            .iter()
            .filter(|f| {
                f.extracted_text
                    .as_deref()
                    .map(|t| t.trim().len() > self.config.min_text_length)
                    .unwrap_or(false)
            })
            .collect();

        let mut groups = Vec::new();
        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                if let Some(group) = self.evaluate_pair(candidates[i], candidates[j]) {
                    groups.push(group);
                }
            }
        }
        groups
    }

    fn evaluate_pair(&self, a: &File, b: &File) -> Option<DuplicateGroup> {
        let (larger, smaller) = if a.size > b.size {
            (a, b)
        } else if b.size > a.size {
            (b, a)
        } else {
            return None;
        };

        if larger.size as f64 / (smaller.size as f64) < self.config.size_ratio_threshold {
            return None;
        }
        if larger.last_modified < smaller.last_modified {
            return None;
        }

        let larger_text = larger.extracted_text.as_deref().unwrap_or_default();
        let smaller_text = smaller.extracted_text.as_deref().unwrap_or_default();

        let length_ratio = smaller_text.len() as f64 / larger_text.len().max(1) as f64;
        if !(0.1..=0.9).contains(&length_ratio) {
            return None;
        }

        let larger_chunks = chunk_text(larger_text, self.config.sentences_per_chunk);
        let smaller_chunks = chunk_text(smaller_text, self.config.sentences_per_chunk);
        if larger_chunks.is_empty() || smaller_chunks.is_empty() {
            return None;
        }

        let containment = self.containment_score(&smaller_chunks, &larger_chunks);
        if containment < self.config.containment_threshold {
            return None;
        }

        Some(DuplicateGroup {
            group_type: GroupType::SupersetSubset,
            primary_file: larger.clone(),
            duplicate_files: vec![smaller.clone()],
            similarity_score: containment,
            storage_savings_bytes: smaller.size,
            containment_score: Some(containment),
            detection_method: None,
        })
    }

    /// Fraction of `smaller_chunks` with a chunk in `larger_chunks` scoring at
    /// least `chunk_similarity_threshold` cosine similarity.
    fn containment_score(&self, smaller_chunks: &[String], larger_chunks: &[String]) -> f64 {
        let combined: Vec<String> = smaller_chunks
            .iter()
            .chain(larger_chunks.iter())
            .cloned()
            .collect();

        let contained = match self.model.embed_batch(&combined) {
            Some(vectors) => {
                let (smaller_vecs, larger_vecs) = vectors.split_at(smaller_chunks.len());
                smaller_vecs
                    .iter()
                    .filter(|sv| {
                        larger_vecs
                            .iter()
                            .map(|lv| cosine_similarity(sv, lv))
                            .fold(0.0_f64, f64::max)
                            >= self.config.chunk_similarity_threshold
                    })
                    .count()
            }
            None => smaller_chunks
                .iter()
                .filter(|sc| {
                    larger_chunks
                        .iter()
                        .map(|lc| self.model.similarity(sc, lc))
                        .fold(0.0_f64, f64::max)
                        >= self.config.chunk_similarity_threshold
                })
                .count(),
        };

        contained as f64 / smaller_chunks.len() as f64
    }
}

/// Splits `text` into sentences (falling back to lines, then fixed windows),
/// then groups sentences into chunks of `sentences_per_chunk`.
fn chunk_text(text: &str, sentences_per_chunk: usize) -> Vec<String> {
    let sentence_re = Regex::new(r"[.!?]+\s+").expect("static regex is valid");

    let mut sentences: Vec<&str> = sentence_re
        .split(text)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() {
        sentences = text.lines().map(|l| l.trim()).filter(|l| !l.is_empty()).collect();
    }

    if sentences.is_empty() {
        return text
            .as_bytes()
            .chunks(500)
            .map(|chunk| String::from_utf8_lossy(chunk).trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    sentences
        .chunks(sentences_per_chunk.max(1))
        .map(|group| group.join(" "))
        .collect()
}
