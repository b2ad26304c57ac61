//! BM25 lexical search over the chunk index.
//!
//! Adapted from the teacher's `SqliteStorage::search_fts`: same
//! OR-of-quoted-terms query shape and negated `bm25()` score (FTS5 returns
//! more-negative-is-better; this negates so higher is better, consistent
//! with dense cosine scores). Tenant and classification-ceiling filters are
//! applied as `AND` clauses inside the `MATCH` query itself, never as a
//! post-filter over an unscoped result set.

use crate::core::fact::ClassificationLevel;
use crate::error::{Result, StorageError};
use rusqlite::{Connection, params_from_iter};

/// One lexical match: the chunk's string id (not row id — ties between
/// equally-scored chunks break by `chunk_id` ascending further up the
/// fusion pipeline) and its BM25 score.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    /// Stable chunk identifier.
    pub chunk_id: String,
    /// Negated BM25 score; higher is a better match.
    pub score: f64,
}

fn fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Runs a BM25 query scoped to `tenant_id` and every classification level
/// at or below `ceiling`.
///
/// # Errors
///
/// Returns an error if the underlying FTS5 query fails.
pub fn search(
    conn: &Connection,
    tenant_id: &str,
    ceiling: ClassificationLevel,
    query: &str,
    limit: usize,
) -> Result<Vec<LexicalHit>> {
    let levels = ceiling.at_or_below();
    let placeholders = levels.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT c.chunk_id, -bm25(chunks_fts) as score
         FROM chunks_fts
         JOIN chunks c ON c.id = chunks_fts.rowid
         WHERE chunks_fts MATCH ?
           AND c.tenant_id = ?
           AND c.classification_level IN ({placeholders})
         ORDER BY score DESC, c.chunk_id ASC
         LIMIT ?"
    );

    let mut stmt = conn.prepare(&sql).map_err(StorageError::from)?;
    let fts = fts_query(query);

    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(fts), Box::new(tenant_id.to_string())];
    for level in levels {
        args.push(Box::new(level.as_str()));
    }
    args.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));

    let rows = stmt
        .query_map(params_from_iter(args.iter().map(std::convert::AsRef::as_ref)), |row| {
            Ok(LexicalHit { chunk_id: row.get(0)?, score: row.get(1)? })
        })
        .map_err(StorageError::from)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StorageError::from)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunk::{Chunk, ChunkKind};
    use crate::core::source_ref::SourceReference;
    use crate::retrieval::index::ChunkIndex;

    fn seed(conn: Connection) -> Connection {
        let mut index = ChunkIndex::new(conn);
        index.init().unwrap();
        let source_ref =
            SourceReference::narrative("report.pdf", "hash", crate::core::source_ref::SourceType::PdfNative, Some(1), "pdf-extract", 0, 0.9);
        let chunk = Chunk::new(
            "doc-1",
            source_ref.clone(),
            ChunkKind::Narrative,
            "Ricavi in forte crescita nel quarto trimestre.".to_string(),
            "acme",
            ClassificationLevel::Internal,
        );
        index.upsert_chunk(&chunk).unwrap();
        let restricted = Chunk::new(
            "doc-1",
            source_ref,
            ChunkKind::Narrative,
            "Dettagli riservati sulla crescita.".to_string(),
            "acme",
            ClassificationLevel::Restricted,
        );
        index.upsert_chunk(&restricted).unwrap();
        index.into_connection()
    }

    #[test]
    fn test_search_finds_matching_chunk() {
        let conn = seed(Connection::open_in_memory().unwrap());
        let hits = search(&conn, "acme", ClassificationLevel::Internal, "crescita", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_excludes_above_ceiling() {
        let conn = seed(Connection::open_in_memory().unwrap());
        let hits = search(&conn, "acme", ClassificationLevel::Internal, "riservati", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_search_excludes_other_tenant() {
        let conn = seed(Connection::open_in_memory().unwrap());
        let hits = search(&conn, "other-tenant", ClassificationLevel::Restricted, "crescita", 10).unwrap();
        assert!(hits.is_empty());
    }
}
