//! Combines lexical and dense result lists into one ranked list.
//!
//! Weighted min-max fusion is the default strategy: each side's scores are
//! min-max normalized to `[0, 1]` and weighted by `RetrievalConfig`'s
//! lexical/dense weights. Reciprocal rank fusion, adapted from the
//! teacher's `search::rrf` (generalized from `i64` chunk row ids to string
//! `chunk_id`s), is kept as an alternate strategy for callers who want a
//! rank-based combination instead of a score-based one. Either way, a
//! chunk appearing in both lists is deduplicated by `chunk_id`, keeping
//! its higher weighted score rather than summing the two, and ties break
//! by `chunk_id` ascending.

use crate::retrieval::dense::DenseHit;
use crate::retrieval::lexical::LexicalHit;
use std::collections::HashMap;

/// One fused, deduplicated result.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    /// Stable chunk identifier.
    pub chunk_id: String,
    /// Fused score; comparable only to other scores from the same fusion
    /// call, never persisted or compared across queries.
    pub score: f64,
}

/// Fusion strategy applied to lexical and dense result lists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionStrategy {
    /// Min-max normalize each side, then weighted sum.
    WeightedMinMax {
        /// Weight applied to the lexical side after normalization.
        lexical_weight: f32,
        /// Weight applied to the dense side after normalization.
        dense_weight: f32,
    },
    /// Reciprocal rank fusion; ignores raw scores, uses rank position only.
    ReciprocalRank {
        /// The k parameter controlling how much weight lower ranks get.
        k: u32,
    },
}

/// Default reciprocal-rank-fusion k, matching the original paper's
/// recommendation.
pub const DEFAULT_RRF_K: u32 = 60;

fn min_max_normalize<T>(hits: &[T], score: impl Fn(&T) -> f64) -> HashMap<usize, f64> {
    if hits.is_empty() {
        return HashMap::new();
    }
    let scores: Vec<f64> = hits.iter().map(&score).collect();
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| (i, if range > 0.0 { (s - min) / range } else { 1.0 }))
        .collect()
}

/// Fuses `lexical` and `dense` result lists per `strategy`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn fuse(lexical: &[LexicalHit], dense: &[DenseHit], strategy: FusionStrategy) -> Vec<FusedHit> {
    let mut scores: HashMap<String, f64> = HashMap::new();

    match strategy {
        FusionStrategy::WeightedMinMax { lexical_weight, dense_weight } => {
            let lex_norm = min_max_normalize(lexical, |h| h.score);
            for (i, hit) in lexical.iter().enumerate() {
                let normalized = lex_norm.get(&i).copied().unwrap_or(0.0);
                let weighted = normalized * f64::from(lexical_weight);
                let entry = scores.entry(hit.chunk_id.clone()).or_insert(weighted);
                if weighted > *entry {
                    *entry = weighted;
                }
            }
            let dense_norm = min_max_normalize(dense, |h| f64::from(h.score));
            for (i, hit) in dense.iter().enumerate() {
                let normalized = dense_norm.get(&i).copied().unwrap_or(0.0);
                let weighted = normalized * f64::from(dense_weight);
                let entry = scores.entry(hit.chunk_id.clone()).or_insert(weighted);
                if weighted > *entry {
                    *entry = weighted;
                }
            }
        }
        FusionStrategy::ReciprocalRank { k } => {
            // Classic RRF sums reciprocal ranks across lists rather than
            // keeping a max; a chunk ranked well by both methods should
            // outscore one ranked well by only one.
            for (rank, hit) in lexical.iter().enumerate() {
                *scores.entry(hit.chunk_id.clone()).or_insert(0.0) += 1.0 / f64::from(k + rank as u32 + 1);
            }
            for (rank, hit) in dense.iter().enumerate() {
                *scores.entry(hit.chunk_id.clone()).or_insert(0.0) += 1.0 / f64::from(k + rank as u32 + 1);
            }
        }
    }

    let mut fused: Vec<FusedHit> = scores.into_iter().map(|(chunk_id, score)| FusedHit { chunk_id, score }).collect();
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_min_max_favors_chunk_strong_on_both_sides() {
        let lexical = vec![
            LexicalHit { chunk_id: "a".to_string(), score: 10.0 },
            LexicalHit { chunk_id: "b".to_string(), score: 1.0 },
        ];
        let dense =
            vec![DenseHit { chunk_id: "a".to_string(), score: 0.9 }, DenseHit { chunk_id: "b".to_string(), score: 0.1 }];
        let fused = fuse(&lexical, &dense, FusionStrategy::WeightedMinMax { lexical_weight: 0.4, dense_weight: 0.6 });
        assert_eq!(fused[0].chunk_id, "a");
    }

    #[test]
    fn test_fusion_deduplicates_by_chunk_id() {
        let lexical = vec![LexicalHit { chunk_id: "a".to_string(), score: 5.0 }];
        let dense = vec![DenseHit { chunk_id: "a".to_string(), score: 0.5 }];
        let fused = fuse(&lexical, &dense, FusionStrategy::WeightedMinMax { lexical_weight: 0.4, dense_weight: 0.6 });
        assert_eq!(fused.len(), 1);
    }

    #[test]
    fn test_tie_breaks_by_chunk_id_ascending() {
        let lexical = vec![
            LexicalHit { chunk_id: "z".to_string(), score: 1.0 },
            LexicalHit { chunk_id: "a".to_string(), score: 1.0 },
        ];
        let fused = fuse(&lexical, &[], FusionStrategy::WeightedMinMax { lexical_weight: 1.0, dense_weight: 0.0 });
        assert_eq!(fused[0].chunk_id, "a");
        assert_eq!(fused[1].chunk_id, "z");
    }

    #[test]
    fn test_reciprocal_rank_fusion_combines_ranks() {
        let lexical = vec![LexicalHit { chunk_id: "a".to_string(), score: 9.0 }];
        let dense = vec![DenseHit { chunk_id: "a".to_string(), score: 0.9 }];
        let fused = fuse(&lexical, &dense, FusionStrategy::ReciprocalRank { k: DEFAULT_RRF_K });
        assert!((fused[0].score - 2.0 / f64::from(DEFAULT_RRF_K + 1)).abs() < 1e-9);
    }
}
