//! Cross-encoder reranking of fused results.
//!
//! A cross-encoder scores a `(query, chunk_text)` pair directly rather than
//! comparing independently embedded vectors, which is slower but usually
//! more precise; it runs over only the top-M fused candidates for that
//! reason. Exposed behind a trait so a missing or unloaded model degrades
//! rather than fails: `available()` lets the caller skip the stage up
//! front instead of discovering failure through a `Result`.

use crate::error::Result;

/// Scores `(query, chunk_text)` pairs for reranking.
pub trait CrossEncoder: Send + Sync {
    /// Whether this cross-encoder is ready to score. Checked before every
    /// rerank pass so a model that failed to load degrades silently.
    fn available(&self) -> bool;

    /// Scores one `(query, chunk_text)` pair. Higher is more relevant.
    ///
    /// # Errors
    ///
    /// Returns an error if scoring fails after `available` reported `true`.
    fn score(&self, query: &str, chunk_text: &str) -> Result<f32>;
}

/// Cross-encoder that is always unavailable, the default when no reranking
/// model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCrossEncoder;

impl CrossEncoder for NullCrossEncoder {
    fn available(&self) -> bool {
        false
    }

    fn score(&self, _query: &str, _chunk_text: &str) -> Result<f32> {
        Err(crate::error::RetrievalError::NoStrategyAvailable.into())
    }
}

/// Reranks `candidates` (pre-sorted by fusion score) against `query`,
/// returning `(index, cross_encoder_score)` pairs sorted by score
/// descending, ties broken by the candidates' original order (their
/// preceding fusion rank).
///
/// # Errors
///
/// Returns an error if the cross-encoder reports itself available but
/// fails to score a pair.
pub fn rerank(encoder: &dyn CrossEncoder, query: &str, candidates: &[&str]) -> Result<Vec<(usize, f32)>> {
    let mut scored = Vec::with_capacity(candidates.len());
    for (index, text) in candidates.iter().enumerate() {
        let score = encoder.score(query, text)?;
        scored.push((index, score));
    }
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
    });
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEncoder;
    impl CrossEncoder for StubEncoder {
        fn available(&self) -> bool {
            true
        }
        fn score(&self, query: &str, chunk_text: &str) -> Result<f32> {
            let shared = query.split_whitespace().filter(|w| chunk_text.contains(w)).count();
            Ok(shared as f32)
        }
    }

    #[test]
    fn test_null_cross_encoder_unavailable() {
        assert!(!NullCrossEncoder.available());
        assert!(NullCrossEncoder.score("q", "t").is_err());
    }

    #[test]
    fn test_rerank_sorts_by_score_descending() {
        let candidates = vec!["ricavi in crescita", "costi stabili", "ricavi netti in forte crescita"];
        let result = rerank(&StubEncoder, "ricavi crescita", &candidates).unwrap();
        assert_eq!(result[0].0, 2);
    }

    #[test]
    fn test_rerank_ties_break_by_original_order() {
        let candidates = vec!["a", "b"];
        let result = rerank(&StubEncoder, "nomatch", &candidates).unwrap();
        assert_eq!(result[0].0, 0);
        assert_eq!(result[1].0, 1);
    }
}
