//! Dense (embedding cosine-similarity) search over the chunk index.
//!
//! Adapted from the teacher's default/fallback `semantic_search`: a
//! brute-force scan over every embedding with a query vector, scored by
//! `embedding::cosine_similarity`. Tenant and classification filters are
//! applied in the SQL that selects candidate rows, so the scan never
//! touches a chunk the caller can't see in the first place.

use crate::core::fact::ClassificationLevel;
use crate::embedding::cosine_similarity;
use crate::error::{Result, StorageError};
use rusqlite::{Connection, params_from_iter};

/// One dense match.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseHit {
    /// Stable chunk identifier.
    pub chunk_id: String,
    /// Cosine similarity to the query embedding, in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Scores every embedded chunk in `tenant_id`'s scope (at or below
/// `ceiling`) against `query_embedding`, returning the top `limit` by
/// cosine similarity, ties broken by `chunk_id` ascending.
///
/// # Errors
///
/// Returns an error if the underlying query fails.
pub fn search(
    conn: &Connection,
    tenant_id: &str,
    ceiling: ClassificationLevel,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<DenseHit>> {
    let levels = ceiling.at_or_below();
    let placeholders = levels.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT c.chunk_id, ce.embedding
         FROM chunk_embeddings ce
         JOIN chunks c ON c.id = ce.chunk_id
         WHERE c.tenant_id = ?
           AND c.classification_level IN ({placeholders})"
    );

    let mut stmt = conn.prepare(&sql).map_err(StorageError::from)?;
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(tenant_id.to_string())];
    for level in levels {
        args.push(Box::new(level.as_str()));
    }

    let rows = stmt
        .query_map(params_from_iter(args.iter().map(std::convert::AsRef::as_ref)), |row| {
            let chunk_id: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((chunk_id, bytes))
        })
        .map_err(StorageError::from)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StorageError::from)?;

    let mut scored: Vec<DenseHit> = rows
        .into_iter()
        .map(|(chunk_id, bytes)| {
            let embedding: Vec<f32> =
                bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect();
            let score = cosine_similarity(query_embedding, &embedding);
            DenseHit { chunk_id, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
    scored.truncate(limit);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunk::{Chunk, ChunkKind};
    use crate::core::source_ref::{SourceReference, SourceType};
    use crate::retrieval::index::ChunkIndex;

    fn seed() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let mut index = ChunkIndex::new(conn);
        index.init().unwrap();
        let source_ref = SourceReference::narrative("report.pdf", "hash", SourceType::PdfNative, Some(1), "pdf-extract", 0, 0.9);
        let chunk_a = Chunk::new(
            "doc-1",
            source_ref.clone(),
            ChunkKind::Narrative,
            "matching chunk".to_string(),
            "acme",
            ClassificationLevel::Internal,
        );
        let row_a = index.upsert_chunk(&chunk_a).unwrap();
        index.upsert_embedding(row_a, &[1.0, 0.0, 0.0]).unwrap();

        let chunk_b =
            Chunk::new("doc-1", source_ref, ChunkKind::Narrative, "unrelated chunk".to_string(), "acme", ClassificationLevel::Internal);
        let row_b = index.upsert_chunk(&chunk_b).unwrap();
        index.upsert_embedding(row_b, &[0.0, 1.0, 0.0]).unwrap();

        index.into_connection()
    }

    #[test]
    fn test_search_ranks_closest_embedding_first() {
        let conn = seed();
        let hits = search(&conn, "acme", ClassificationLevel::Internal, &[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_search_respects_limit() {
        let conn = seed();
        let hits = search(&conn, "acme", ClassificationLevel::Internal, &[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_excludes_other_tenant() {
        let conn = seed();
        let hits = search(&conn, "other", ClassificationLevel::Internal, &[1.0, 0.0, 0.0], 10).unwrap();
        assert!(hits.is_empty());
    }
}
