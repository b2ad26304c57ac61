//! Hybrid (lexical + dense) retrieval over indexed chunks.
//!
//! Composes the teacher's `search::hybrid_search` pipeline shape (BM25 +
//! semantic, fused, reranked) with row-level tenant/classification scoping
//! applied at the index layer rather than after the fact.

pub mod cache;
pub mod dense;
pub mod fusion;
pub mod index;
pub mod lexical;
pub mod rerank;
pub mod schema;

use crate::access::UserContext;
use crate::core::chunk::Chunk;
use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::retrieval::cache::{CacheKey, QueryCache};
use crate::retrieval::fusion::FusionStrategy;
use crate::retrieval::index::ChunkIndex;
use crate::retrieval::rerank::{CrossEncoder, NullCrossEncoder};
use std::sync::Arc;

/// Optional narrowing applied to a `retrieve` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalFilters {
    /// Restrict to one document.
    pub document_id: Option<String>,
    /// Restrict to chunks mentioning this canonical period string.
    pub period: Option<String>,
    /// Restrict to chunks mentioning this canonical metric id.
    pub metric_id: Option<String>,
}

impl RetrievalFilters {
    fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(document_id) = &self.document_id {
            if &chunk.document_id != document_id {
                return false;
            }
        }
        if let Some(period) = &self.period {
            if !chunk.text.contains(period.as_str()) {
                return false;
            }
        }
        if let Some(metric_id) = &self.metric_id {
            if !chunk.text.to_lowercase().contains(&metric_id.to_lowercase()) {
                return false;
            }
        }
        true
    }

    fn repr(&self) -> String {
        format!("{:?}", self)
    }
}

/// Which retrieval strategy actually produced a result set, surfaced so
/// degraded answers are never silently indistinguishable from full ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// Lexical + dense, fused, reranked.
    Full,
    /// Lexical + dense, fused, no cross-encoder available.
    FusedOnly,
    /// Dense index unavailable; lexical results only.
    LexicalOnly,
    /// Lexical index unavailable; dense results only.
    DenseOnly,
    /// Served from the query-result cache.
    Cached,
}

/// A chunk plus its final retrieval score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Final score after fusion (and reranking, if it ran). Comparable
    /// only within the same `retrieve` call.
    pub score: f64,
    /// Which strategy produced this result.
    pub strategy: RetrievalStrategy,
}

const DEFAULT_LIST_SIZE: usize = 20;

/// Composes lexical search, dense search, fusion, optional reranking, and
/// an optional result cache into a single `retrieve` entry point.
pub struct HybridRetriever {
    index: Arc<ChunkIndex>,
    embedder: Arc<dyn Embedder>,
    cross_encoder: Arc<dyn CrossEncoder>,
    cache: Option<QueryCache>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    /// Builds a retriever with no cross-encoder and no cache, suitable for
    /// deployments that have not configured either.
    #[must_use]
    pub fn new(index: Arc<ChunkIndex>, embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self { index, embedder, cross_encoder: Arc::new(NullCrossEncoder), cache: None, config }
    }

    /// Attaches a cross-encoder for step-5 reranking.
    #[must_use]
    pub fn with_cross_encoder(mut self, cross_encoder: Arc<dyn CrossEncoder>) -> Self {
        self.cross_encoder = cross_encoder;
        self
    }

    /// Attaches a TTL query-result cache.
    #[must_use]
    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Invalidates cached results for `tenant_id`. Call whenever a document
    /// in that tenant's scope transitions to or from `ready`.
    pub fn invalidate_cache_for_tenant(&self, tenant_id: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_tenant(tenant_id);
        }
    }

    /// Retrieves the `top_k` most relevant chunks for `query`, scoped to
    /// `user_ctx`'s tenant and classification ceiling.
    ///
    /// Always filters tenant and classification at the index layer (never
    /// as a post-filter). BM25 and dense search each return up to 20
    /// candidates by default; fusion weights them per `RetrievalConfig`,
    /// and the top-M fused candidates (M = `rerank_candidates`, at least
    /// `top_k`) are reranked by the cross-encoder when one is available.
    /// Never fails solely because a subcomponent (dense index,
    /// cross-encoder) is unavailable; degrades and reports the strategy
    /// actually used instead.
    ///
    /// # Errors
    ///
    /// Returns an error if both the lexical and dense stages fail, or if a
    /// storage-layer query fails outright.
    pub fn retrieve(
        &self,
        query: &str,
        user_ctx: &UserContext,
        top_k: usize,
        filters: &RetrievalFilters,
    ) -> Result<Vec<ScoredChunk>> {
        let ceiling = user_ctx.max_classification_level;
        let cache_key = CacheKey::new(query, &user_ctx.tenant_id, ceiling, &filters.repr(), top_k);

        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.get(&cache_key) {
                return Ok(entry
                    .chunks
                    .into_iter()
                    .map(|(chunk, score)| ScoredChunk { chunk, score, strategy: RetrievalStrategy::Cached })
                    .collect());
            }
        }

        let list_size = DEFAULT_LIST_SIZE.max(top_k);

        let lexical_result =
            lexical::search(&self.index.connection(), &user_ctx.tenant_id, ceiling, query, list_size);
        let dense_result = self
            .embedder
            .embed(query)
            .and_then(|embedding| dense::search(&self.index.connection(), &user_ctx.tenant_id, ceiling, &embedding, list_size));

        let (lexical_hits, dense_hits, mut strategy) = match (lexical_result, dense_result) {
            (Ok(lex), Ok(dense)) => (lex, dense, RetrievalStrategy::FusedOnly),
            (Ok(lex), Err(_)) => (lex, Vec::new(), RetrievalStrategy::LexicalOnly),
            (Err(_), Ok(dense)) => (Vec::new(), dense, RetrievalStrategy::DenseOnly),
            (Err(lex_err), Err(_)) => return Err(lex_err),
        };

        let strategy_forced_single_source = strategy != RetrievalStrategy::FusedOnly;

        let fused = fusion::fuse(
            &lexical_hits,
            &dense_hits,
            FusionStrategy::WeightedMinMax {
                lexical_weight: self.config.lexical_weight,
                dense_weight: self.config.dense_weight,
            },
        );

        let rerank_width = self.config.rerank_candidates.max(top_k).min(fused.len());
        let candidate_ids: Vec<String> = fused.iter().take(rerank_width).map(|h| h.chunk_id.clone()).collect();
        let mut candidate_chunks = self.index.fetch_chunks(&candidate_ids)?;
        candidate_chunks.retain(|chunk| filters.matches(chunk));

        let fused_scores: std::collections::HashMap<&str, f64> =
            fused.iter().map(|h| (h.chunk_id.as_str(), h.score)).collect();

        let use_rerank = self.config.rerank_enabled && !strategy_forced_single_source && self.cross_encoder.available();

        let mut results: Vec<ScoredChunk> = if use_rerank {
            let texts: Vec<&str> = candidate_chunks.iter().map(|c| c.text.as_str()).collect();
            let ranked = rerank::rerank(self.cross_encoder.as_ref(), query, &texts)?;
            strategy = RetrievalStrategy::Full;
            ranked
                .into_iter()
                .map(|(idx, score)| ScoredChunk { chunk: candidate_chunks[idx].clone(), score: f64::from(score), strategy })
                .collect()
        } else {
            candidate_chunks
                .into_iter()
                .map(|chunk| {
                    let score = fused_scores.get(chunk.chunk_id.as_str()).copied().unwrap_or(0.0);
                    ScoredChunk { chunk, score, strategy }
                })
                .collect()
        };

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id)));
        results.truncate(top_k);

        if let Some(cache) = &self.cache {
            cache.put(
                cache_key,
                results.iter().map(|r| (r.chunk.clone(), r.score)).collect(),
                strategy,
            );
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::core::chunk::ChunkKind;
    use crate::core::fact::ClassificationLevel;
    use crate::core::source_ref::{SourceReference, SourceType};
    use crate::embedding::FallbackEmbedder;
    use rusqlite::Connection;
    use std::collections::BTreeSet;

    fn sample_ctx() -> UserContext {
        UserContext {
            user_id: "u1".to_string(),
            username: "mario.rossi".to_string(),
            tenant_id: "acme".to_string(),
            role: Role::Analyst,
            accessible_entities: BTreeSet::new(),
            accessible_periods: BTreeSet::new(),
            max_classification_level: ClassificationLevel::Internal,
            session_id: "sess-1".to_string(),
            session_expires_at: 9_999_999_999,
        }
    }

    fn seeded_retriever() -> HybridRetriever {
        let conn = Connection::open_in_memory().unwrap();
        let mut index = ChunkIndex::new(conn);
        index.init().unwrap();
        let source_ref = SourceReference::narrative("report.pdf", "hash", SourceType::PdfNative, Some(1), "pdf-extract", 0, 0.9);
        let embedder = FallbackEmbedder::new(crate::embedding::DEFAULT_DIMENSIONS);
        for (text, tenant) in [
            ("Ricavi in forte crescita nel 2024.", "acme"),
            ("Costi operativi stabili rispetto al 2023.", "acme"),
            ("Segreto industriale non divulgabile.", "other-tenant"),
        ] {
            let chunk =
                Chunk::new("doc-1", source_ref.clone(), ChunkKind::Narrative, text.to_string(), tenant, ClassificationLevel::Internal);
            let row_id = index.upsert_chunk(&chunk).unwrap();
            let embedding = crate::embedding::Embedder::embed(&embedder, text).unwrap();
            index.upsert_embedding(row_id, &embedding).unwrap();
        }
        HybridRetriever::new(Arc::new(index), Arc::new(embedder), RetrievalConfig::default())
    }

    #[test]
    fn test_retrieve_scopes_to_tenant() {
        let retriever = seeded_retriever();
        let results = retriever.retrieve("crescita", &sample_ctx(), 10, &RetrievalFilters::default()).unwrap();
        assert!(results.iter().all(|r| r.chunk.tenant_id == "acme"));
    }

    #[test]
    fn test_retrieve_respects_document_filter() {
        let retriever = seeded_retriever();
        let filters = RetrievalFilters { document_id: Some("doc-1".to_string()), ..Default::default() };
        let results = retriever.retrieve("ricavi", &sample_ctx(), 10, &filters).unwrap();
        assert!(results.iter().all(|r| r.chunk.document_id == "doc-1"));
    }

    #[test]
    fn test_retrieve_degrades_without_cross_encoder() {
        let retriever = seeded_retriever();
        let results = retriever.retrieve("ricavi crescita", &sample_ctx(), 5, &RetrievalFilters::default()).unwrap();
        assert!(results.iter().all(|r| r.strategy != RetrievalStrategy::Full));
    }

    #[test]
    fn test_retrieve_caches_identical_query() {
        let retriever = seeded_retriever().with_cache(QueryCache::new(300, 10));
        let first = retriever.retrieve("ricavi", &sample_ctx(), 5, &RetrievalFilters::default()).unwrap();
        let second = retriever.retrieve("ricavi", &sample_ctx(), 5, &RetrievalFilters::default()).unwrap();
        assert_eq!(first.len(), second.len());
        assert!(second.iter().all(|r| r.strategy == RetrievalStrategy::Cached) || second.is_empty());
    }
}
