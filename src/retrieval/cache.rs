//! Query-result cache.
//!
//! A bounded TTL cache keyed by the normalized query plus every parameter
//! that changes the result set, so two callers with different scopes never
//! share a cached answer. Follows the `parking_lot::RwLock` convention
//! `ontology::Ontology` uses for shared mutable state behind an `Arc`.

use crate::core::chunk::Chunk;
use crate::core::fact::ClassificationLevel;
use crate::retrieval::RetrievalStrategy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Cache key: every input that can change a `retrieve` call's result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased, whitespace-collapsed query text.
    pub normalized_query: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Caller's classification ceiling at query time.
    pub classification_ceiling: ClassificationLevel,
    /// Hash of the optional `document_id`/`period`/`metric_id` filters.
    pub filters_hash: u64,
    /// Requested result count.
    pub top_k: usize,
}

impl CacheKey {
    /// Builds a key, normalizing `query` and hashing `filters_repr` (the
    /// filters' canonical debug/display form — callers own how they
    /// serialize their filter struct).
    #[must_use]
    pub fn new(
        query: &str,
        tenant_id: &str,
        classification_ceiling: ClassificationLevel,
        filters_repr: &str,
        top_k: usize,
    ) -> Self {
        let normalized_query = query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let mut hasher = DefaultHasher::new();
        filters_repr.hash(&mut hasher);
        Self {
            normalized_query,
            tenant_id: tenant_id.to_string(),
            classification_ceiling,
            filters_hash: hasher.finish(),
            top_k,
        }
    }
}

/// A cached `retrieve` result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached chunks, already scored and ordered.
    pub chunks: Vec<(Chunk, f64)>,
    /// Which retrieval strategy produced this entry, surfaced to callers
    /// even on a cache hit.
    pub strategy: RetrievalStrategy,
    /// Unix timestamp this entry expires at.
    pub expires_at: i64,
}

/// TTL-bounded, single-flight-free query cache. (Single-flight collapsing
/// of concurrent identical queries is left to the orchestrator's
/// concurrency layer, which already serializes per-query work.)
pub struct QueryCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl_seconds: i64,
    capacity: usize,
}

impl QueryCache {
    /// Creates an empty cache with the given TTL and maximum entry count.
    #[must_use]
    pub fn new(ttl_seconds: u64, capacity: usize) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl_seconds: ttl_seconds.try_into().unwrap_or(i64::MAX), capacity }
    }

    /// Returns a cached entry for `key` if present and not expired.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.expires_at <= crate::ingest::now_unix() {
            return None;
        }
        Some(entry.clone())
    }

    /// Inserts or replaces the entry for `key`, evicting an arbitrary
    /// entry first if at capacity.
    pub fn put(&self, key: CacheKey, chunks: Vec<(Chunk, f64)>, strategy: RetrievalStrategy) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(evict_key) = entries.keys().next().cloned() {
                entries.remove(&evict_key);
            }
        }
        entries.insert(key, CacheEntry { chunks, strategy, expires_at: crate::ingest::now_unix() + self.ttl_seconds });
    }

    /// Invalidates every cached entry scoped to `tenant_id`. Called when a
    /// document in that tenant's scope transitions to or from `ready`,
    /// since any cached result may now be stale or newly complete.
    pub fn invalidate_tenant(&self, tenant_id: &str) {
        self.entries.lock().retain(|key, _| key.tenant_id != tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunk::ChunkKind;
    use crate::core::source_ref::{SourceReference, SourceType};

    fn sample_chunk() -> Chunk {
        let source_ref = SourceReference::narrative("r.pdf", "hash", SourceType::PdfNative, Some(1), "pdf-extract", 0, 0.9);
        Chunk::new("doc-1", source_ref, ChunkKind::Narrative, "text".to_string(), "acme", ClassificationLevel::Internal)
    }

    #[test]
    fn test_cache_hit_within_ttl() {
        let cache = QueryCache::new(300, 10);
        let key = CacheKey::new("revenue 2024", "acme", ClassificationLevel::Internal, "", 10);
        cache.put(key.clone(), vec![(sample_chunk(), 0.9)], RetrievalStrategy::Full);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_cache_miss_for_different_tenant() {
        let cache = QueryCache::new(300, 10);
        let key_a = CacheKey::new("q", "acme", ClassificationLevel::Internal, "", 10);
        let key_b = CacheKey::new("q", "other", ClassificationLevel::Internal, "", 10);
        cache.put(key_a, vec![(sample_chunk(), 0.9)], RetrievalStrategy::Full);
        assert!(cache.get(&key_b).is_none());
    }

    #[test]
    fn test_invalidate_tenant_clears_only_that_tenants_entries() {
        let cache = QueryCache::new(300, 10);
        let key_a = CacheKey::new("q", "acme", ClassificationLevel::Internal, "", 10);
        let key_b = CacheKey::new("q", "other", ClassificationLevel::Internal, "", 10);
        cache.put(key_a.clone(), vec![(sample_chunk(), 0.9)], RetrievalStrategy::Full);
        cache.put(key_b.clone(), vec![(sample_chunk(), 0.9)], RetrievalStrategy::Full);
        cache.invalidate_tenant("acme");
        assert!(cache.get(&key_a).is_none());
        assert!(cache.get(&key_b).is_some());
    }

    #[test]
    fn test_normalized_query_collapses_whitespace_and_case() {
        let a = CacheKey::new("Revenue   2024", "acme", ClassificationLevel::Internal, "", 10);
        let b = CacheKey::new("revenue 2024", "acme", ClassificationLevel::Internal, "", 10);
        assert_eq!(a, b);
    }
}
