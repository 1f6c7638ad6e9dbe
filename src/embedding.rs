//! Sentence embeddings with a pure-text degraded fallback.
//!
//! [`EmbeddingModel`] wraps a lazily-loaded `fastembed` backend. If the
//! backend fails to load (no network, unsupported platform, model fetch
//! failure), every similarity query instead falls through to
//! [`fallback_composite_similarity`], a deterministic character/word overlap
//! score. Callers never observe the difference beyond (possibly) coarser
//! scores — the contract (batch embedding, pairwise similarity, filename
//! similarity, all in `[0, 1]`) holds either way.

use fastembed::{EmbeddingModel as FastEmbedModelId, InitOptions, TextEmbedding};
use tracing::warn;

/// Sentence embedding capability with automatic degraded-mode fallback.
pub struct EmbeddingModel {
    backend: Option<TextEmbedding>,
}

impl EmbeddingModel {
    /// Attempts to load the named embedding model. Never fails: a load error
    /// is logged and the model degrades to the pure-text fallback.
    pub fn load(model_id: &str) -> Self {
        let fastembed_id = match model_id {
            "AllMiniLML6V2" | "" => FastEmbedModelId::AllMiniLML6V2,
            other => {
                warn!("unknown embedding model id {other:?}, defaulting to AllMiniLML6V2");
                FastEmbedModelId::AllMiniLML6V2
            }
        };

        let backend = match TextEmbedding::try_new(InitOptions::new(fastembed_id)) {
            Ok(model) => Some(model),
            Err(err) => {
                warn!("embedding model unavailable, running in degraded mode: {err}");
                None
            }
        };

        Self { backend }
    }

    /// Builds a model that always runs in degraded mode, skipping the load
    /// attempt entirely. Used in tests and by callers who want deterministic,
    /// fast, offline scoring.
    pub fn degraded() -> Self {
        Self { backend: None }
    }

    pub fn is_degraded(&self) -> bool {
        self.backend.is_none()
    }

    /// Batch-embeds `texts`, or returns `None` if running in degraded mode or
    /// the backend call fails.
    pub fn embed_batch(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        let backend = self.backend.as_ref()?;
        match backend.embed(texts.to_vec(), None) {
            Ok(vectors) => Some(vectors),
            Err(err) => {
                warn!("embedding batch failed, falling back: {err}");
                None
            }
        }
    }

    /// Similarity between two pieces of body text, in `[0, 1]`.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        match self.embed_pair(a, b) {
            Some((va, vb)) => cosine_similarity(&va, &vb),
            None => fallback_composite_similarity(a, b),
        }
    }

    /// Similarity between two filenames, in `[0, 1]`.
    pub fn filename_similarity(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        match self.embed_pair(a, b) {
            Some((va, vb)) => cosine_similarity(&va, &vb),
            None => fallback_composite_similarity(a, b),
        }
    }

    fn embed_pair(&self, a: &str, b: &str) -> Option<(Vec<f32>, Vec<f32>)> {
        let embeddings = self.embed_batch(&[a.to_string(), b.to_string()])?;
        let mut it = embeddings.into_iter();
        Some((it.next()?, it.next()?))
    }
}

/// Cosine similarity, clamped to `[0, 1]` (embeddings from a well-behaved
/// sentence model are near-orthogonal at worst for unrelated text; negative
/// cosine is treated as no similarity rather than propagated).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    ((dot / (norm_a * norm_b)) as f64).clamp(0.0, 1.0)
}

/// The degraded-mode composite score: `0.4 * character_ratio + 0.6 * jaccard`,
/// computed over lowercased, trimmed inputs. Deterministic and pure — no
/// embedding call involved, regardless of whether a model is loaded. This is
/// also what the near-duplicate group's average-score step uses for filename
/// similarity, even when clustering used the semantic signal (see the design
/// notes on the preserved content/filename-similarity asymmetry).
pub fn fallback_composite_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let a = a.trim();
    let b = b.to_lowercase();
    let b = b.trim();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    0.4 * character_ratio(a, b) + 0.6 * jaccard_over_whitespace_tokens(a, b)
}

/// Character-level similarity ratio in `[0, 1]`, approximating difflib's
/// matching-blocks ratio via longest-common-subsequence length:
/// `2 * lcs_len / (len(a) + len(b))`.
pub fn character_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs_len = prev[b.len()];

    (2 * lcs_len) as f64 / (a.len() + b.len()) as f64
}

/// Jaccard similarity of whitespace-separated token sets.
pub fn jaccard_over_whitespace_tokens(a: &str, b: &str) -> f64 {
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_ratio_identical_strings_is_one() {
        assert_eq!(character_ratio("hello world", "hello world"), 1.0);
    }

    #[test]
    fn character_ratio_is_symmetric() {
        assert_eq!(
            character_ratio("report_final", "report_v2"),
            character_ratio("report_v2", "report_final")
        );
    }

    #[test]
    fn character_ratio_empty_inputs() {
        assert_eq!(character_ratio("", ""), 1.0);
        assert_eq!(character_ratio("a", ""), 0.0);
    }

    #[test]
    fn jaccard_disjoint_tokens_is_zero() {
        assert_eq!(jaccard_over_whitespace_tokens("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn jaccard_identical_tokens_is_one() {
        assert_eq!(jaccard_over_whitespace_tokens("alpha beta", "beta alpha"), 1.0);
    }

    #[test]
    fn fallback_composite_is_deterministic_and_pure() {
        let a = fallback_composite_similarity("Quarterly Report.docx", "quarterly report (copy).docx");
        let b = fallback_composite_similarity("Quarterly Report.docx", "quarterly report (copy).docx");
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a));
    }

    #[test]
    fn fallback_composite_empty_input_is_zero() {
        assert_eq!(fallback_composite_similarity("", "anything"), 0.0);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![0.5f32, 0.5, 0.7];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn degraded_model_uses_fallback_for_similarity() {
        let model = EmbeddingModel::degraded();
        assert!(model.is_degraded());
        let score = model.similarity("the quick brown fox", "the quick brown fox jumps");
        assert!(score > 0.0 && score <= 1.0);
    }

    #[test]
    fn degraded_model_filename_similarity_matches_fallback_formula() {
        let model = EmbeddingModel::degraded();
        let direct = fallback_composite_similarity("invoice_2024.pdf", "invoice_2024_final.pdf");
        let via_model = model.filename_similarity("invoice_2024.pdf", "invoice_2024_final.pdf");
        assert_eq!(direct, via_model);
    }

    #[test]
    fn degraded_model_embed_batch_is_none() {
        let model = EmbeddingModel::degraded();
        assert!(model.embed_batch(&["hi".to_string()]).is_none());
    }
}
