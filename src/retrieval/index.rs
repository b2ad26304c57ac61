//! Chunk indexing: splits extracted blocks into retrieval-sized chunks and
//! persists them alongside their embeddings.
//!
//! Narrative blocks are split on a sliding token window; table blocks are
//! kept whole, one chunk per table, since splitting a textualized table
//! mid-row would strand a label from its value. Mirrors the teacher's
//! `SqliteStorage` connection-ownership pattern: one struct wrapping a
//! `rusqlite::Connection`, schema created in `init`.

use crate::core::chunk::{Chunk, ChunkKind};
use crate::core::fact::ClassificationLevel;
use crate::core::source_ref::SourceReference;
use crate::error::{Result, StorageError};
use crate::ingest::{BlockKind, ExtractedBlock};
use crate::retrieval::schema::{CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension, params};

/// Narrative chunk target size, in estimated tokens (~4 chars/token).
pub const NARRATIVE_CHUNK_TOKENS: usize = 512;
/// Overlap between consecutive narrative chunks, in estimated tokens.
pub const NARRATIVE_CHUNK_OVERLAP_TOKENS: usize = 50;

const CHARS_PER_TOKEN: usize = 4;

/// Splits `blocks` into chunks: narrative blocks on a sliding window,
/// table blocks kept whole.
#[must_use]
pub fn chunk_blocks(
    document_id: &str,
    tenant_id: &str,
    classification_level: ClassificationLevel,
    blocks: &[ExtractedBlock],
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for block in blocks {
        match block.kind {
            BlockKind::Table | BlockKind::Caption => {
                let kind = if block.kind == BlockKind::Table { ChunkKind::Table } else { ChunkKind::Caption };
                chunks.push(Chunk::new(
                    document_id,
                    block.source_ref.clone(),
                    kind,
                    block.text.clone(),
                    tenant_id,
                    classification_level,
                ));
            }
            BlockKind::Narrative => {
                chunks.extend(chunk_narrative(document_id, tenant_id, classification_level, block));
            }
        }
    }
    chunks
}

fn chunk_narrative(
    document_id: &str,
    tenant_id: &str,
    classification_level: ClassificationLevel,
    block: &ExtractedBlock,
) -> Vec<Chunk> {
    let window_chars = NARRATIVE_CHUNK_TOKENS * CHARS_PER_TOKEN;
    let overlap_chars = NARRATIVE_CHUNK_OVERLAP_TOKENS * CHARS_PER_TOKEN;
    let stride = window_chars.saturating_sub(overlap_chars).max(1);

    let text = block.text.as_str();
    if text.len() <= window_chars {
        return vec![Chunk::new(
            document_id,
            block.source_ref.clone(),
            ChunkKind::Narrative,
            text.to_string(),
            tenant_id,
            classification_level,
        )];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let end = char_boundary_at(text, (start + window_chars).min(text.len()));
        let slice = &text[start..end];
        if !slice.trim().is_empty() {
            chunks.push(Chunk::new(
                document_id,
                block.source_ref.clone(),
                ChunkKind::Narrative,
                slice.to_string(),
                tenant_id,
                classification_level,
            ));
        }
        if end >= text.len() {
            break;
        }
        start = char_boundary_at(text, start + stride);
    }
    chunks
}

fn char_boundary_at(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index.min(text.len())
}

/// `SQLite`-backed chunk index.
///
/// Wraps the connection in a `Mutex` rather than holding it bare: a bare
/// `rusqlite::Connection` is `Send` but not `Sync`, which would make
/// `Arc<ChunkIndex>` unusable across the orchestrator's concurrent query
/// tasks. `parking_lot::Mutex<T>` is `Sync` whenever `T: Send`, so this is
/// the minimal change that lets one index be shared read-only by many
/// concurrent `retrieve` calls.
pub struct ChunkIndex {
    conn: Mutex<Connection>,
}

impl ChunkIndex {
    /// Wraps an existing connection.
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    /// Locks and returns the underlying connection, for read queries owned
    /// by sibling modules (`retrieval::lexical`, `retrieval::dense`).
    #[must_use]
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Unwraps the underlying connection.
    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.conn.into_inner()
    }

    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .lock()
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .lock()
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Creates the chunk index schema if it does not exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub fn init(&mut self) -> Result<()> {
        let is_init: i64 = self.conn.lock().query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0)).map_err(StorageError::from)?;
        if is_init == 0 {
            self.conn.lock().execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if self.get_schema_version()?.is_none() {
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        }
        Ok(())
    }

    /// Inserts or replaces a chunk row, keyed by its deterministic
    /// `chunk_id`. Re-ingesting identical bytes produces the same
    /// `chunk_id` and therefore overwrites rather than duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn upsert_chunk(&self, chunk: &Chunk) -> Result<i64> {
        let source_ref_json = serde_json::to_string(&chunk.source_ref).map_err(StorageError::from)?;
        let lexical_terms_json = serde_json::to_string(&chunk.lexical_terms).map_err(StorageError::from)?;
        self.conn
            .lock()
            .execute(
                "INSERT INTO chunks (
                    chunk_id, document_id, tenant_id, classification_level, kind,
                    content, lexical_terms, source_ref, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
                 ON CONFLICT(chunk_id) DO UPDATE SET
                    content = excluded.content,
                    lexical_terms = excluded.lexical_terms,
                    source_ref = excluded.source_ref",
                params![
                    chunk.chunk_id,
                    chunk.document_id,
                    chunk.tenant_id,
                    chunk.classification_level.as_str(),
                    kind_to_str(chunk.kind),
                    chunk.text,
                    lexical_terms_json,
                    source_ref_json,
                    crate::ingest::now_unix(),
                ],
            )
            .map_err(StorageError::from)?;
        self.conn
            .lock()
            .query_row("SELECT id FROM chunks WHERE chunk_id = ?1", params![chunk.chunk_id], |row| row.get(0))
            .map_err(|e| StorageError::from(e).into())
    }

    /// Inserts or replaces a chunk's dense embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn upsert_embedding(&self, chunk_row_id: i64, embedding: &[f32]) -> Result<()> {
        let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
        self.conn
            .lock()
            .execute(
                "INSERT INTO chunk_embeddings (chunk_id, embedding, dimensions, created_at)
                 VALUES (?1,?2,?3,?4)
                 ON CONFLICT(chunk_id) DO UPDATE SET embedding = excluded.embedding, dimensions = excluded.dimensions",
                params![chunk_row_id, bytes, embedding.len() as i64, crate::ingest::now_unix()],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Marks a document ready (or not) for retrieval, invalidating any
    /// cached query whose result set could include it.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_document_ready(&self, document_id: &str, tenant_id: &str, ready: bool) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO documents_ready (document_id, tenant_id, ready) VALUES (?1,?2,?3)
                 ON CONFLICT(document_id) DO UPDATE SET ready = excluded.ready",
                params![document_id, tenant_id, i64::from(ready)],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Reads back a `SourceReference` stored against `chunk_id`, for
    /// provenance display.
    ///
    /// # Errors
    ///
    /// Returns an error if the row is missing or its stored JSON fails to
    /// parse.
    pub fn source_ref_for(&self, chunk_id: &str) -> Result<SourceReference> {
        let json: String = self
            .conn
            .lock()
            .query_row("SELECT source_ref FROM chunks WHERE chunk_id = ?1", params![chunk_id], |row| row.get(0))
            .map_err(StorageError::from)?;
        serde_json::from_str(&json).map_err(|e| StorageError::from(e).into())
    }

    /// Reads back full `Chunk`s for a set of `chunk_id`s, in the order
    /// given. Skips any id that no longer exists (e.g. the document was
    /// deleted between fusion and this read). Embeddings are not
    /// reattached; callers that already fused/reranked have no further use
    /// for the raw vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or a row's stored JSON fails to parse.
    pub fn fetch_chunks(&self, chunk_ids: &[String]) -> Result<Vec<Chunk>> {
        let mut by_id = std::collections::HashMap::with_capacity(chunk_ids.len());
        for chunk_id in chunk_ids {
            let row = self
                .conn
                .lock()
                .query_row(
                    "SELECT document_id, tenant_id, classification_level, kind, content, lexical_terms, source_ref
                     FROM chunks WHERE chunk_id = ?1",
                    params![chunk_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    },
                )
                .optional()
                .map_err(StorageError::from)?;
            if let Some((document_id, tenant_id, classification_level, kind, content, lexical_terms, source_ref)) = row {
                let source_ref: SourceReference = serde_json::from_str(&source_ref).map_err(StorageError::from)?;
                let lexical_terms: Vec<String> = serde_json::from_str(&lexical_terms).map_err(StorageError::from)?;
                by_id.insert(
                    chunk_id.clone(),
                    Chunk {
                        chunk_id: chunk_id.clone(),
                        document_id,
                        source_ref,
                        kind: str_to_kind(&kind),
                        text: content,
                        embedding: None,
                        lexical_terms,
                        tenant_id,
                        classification_level: ClassificationLevel::from_str_or_public(&classification_level),
                    },
                );
            }
        }
        Ok(chunk_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Total number of indexed chunks across every tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn chunk_count(&self) -> Result<i64> {
        self.conn.lock().query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0)).map_err(|e| StorageError::from(e).into())
    }
}

fn str_to_kind(s: &str) -> ChunkKind {
    match s {
        "table" => ChunkKind::Table,
        "caption" => ChunkKind::Caption,
        _ => ChunkKind::Narrative,
    }
}

fn kind_to_str(kind: ChunkKind) -> &'static str {
    match kind {
        ChunkKind::Narrative => "narrative",
        ChunkKind::Table => "table",
        ChunkKind::Caption => "caption",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source_ref::SourceType;

    fn sample_ref() -> SourceReference {
        SourceReference::narrative("report.pdf", "hash", SourceType::PdfNative, Some(1), "pdf-extract", 0, 0.9)
    }

    fn sample_block(text: &str) -> ExtractedBlock {
        ExtractedBlock { kind: BlockKind::Narrative, text: text.to_string(), source_ref: sample_ref() }
    }

    #[test]
    fn test_short_narrative_block_yields_one_chunk() {
        let blocks = vec![sample_block("Ricavi in crescita del 5%.")];
        let chunks = chunk_blocks("doc-1", "acme", ClassificationLevel::Internal, &blocks);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Narrative);
    }

    #[test]
    fn test_long_narrative_block_splits_with_overlap() {
        let long_text = "parola ".repeat(2000);
        let blocks = vec![sample_block(&long_text)];
        let chunks = chunk_blocks("doc-1", "acme", ClassificationLevel::Internal, &blocks);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.estimate_tokens() <= NARRATIVE_CHUNK_TOKENS + 1);
        }
    }

    #[test]
    fn test_table_block_stays_whole() {
        let blocks = vec![ExtractedBlock {
            kind: BlockKind::Table,
            text: "Voce\t2023\t2024\nRicavi\t900000\t1000000\n".to_string(),
            source_ref: sample_ref(),
        }];
        let chunks = chunk_blocks("doc-1", "acme", ClassificationLevel::Internal, &blocks);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Table);
    }

    #[test]
    fn test_init_and_upsert_chunk_round_trips() {
        let conn = Connection::open_in_memory().unwrap();
        let mut index = ChunkIndex::new(conn);
        index.init().unwrap();
        let chunk = Chunk::new(
            "doc-1",
            sample_ref(),
            ChunkKind::Narrative,
            "Ricavi in crescita.".to_string(),
            "acme",
            ClassificationLevel::Internal,
        );
        let row_id = index.upsert_chunk(&chunk).unwrap();
        assert!(row_id > 0);
        index.upsert_embedding(row_id, &[0.1, 0.2, 0.3]).unwrap();
        let fetched = index.source_ref_for(&chunk.chunk_id).unwrap();
        assert_eq!(fetched, chunk.source_ref);
    }

    #[test]
    fn test_reingesting_same_bytes_overwrites_not_duplicates() {
        let conn = Connection::open_in_memory().unwrap();
        let mut index = ChunkIndex::new(conn);
        index.init().unwrap();
        let chunk = Chunk::new(
            "doc-1",
            sample_ref(),
            ChunkKind::Narrative,
            "Ricavi in crescita.".to_string(),
            "acme",
            ClassificationLevel::Internal,
        );
        let first_id = index.upsert_chunk(&chunk).unwrap();
        let second_id = index.upsert_chunk(&chunk).unwrap();
        assert_eq!(first_id, second_id);
    }
}
