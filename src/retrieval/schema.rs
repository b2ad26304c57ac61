//! Database schema for the chunk index.
//!
//! Adapts the teacher's `storage::schema` `chunks`/`chunk_embeddings`/
//! `chunks_fts` trio, adding `tenant_id`/`classification_level` as real
//! columns on every table (including the FTS5 virtual table itself) so
//! filtering happens inside the `WHERE` clause of the lexical and dense
//! queries, never as a post-filter over an unscoped result set.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for the chunk index.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chunk_id TEXT NOT NULL UNIQUE,
    document_id TEXT NOT NULL,
    tenant_id TEXT NOT NULL,
    classification_level TEXT NOT NULL,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    lexical_terms TEXT NOT NULL,
    source_ref TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_tenant ON chunks(tenant_id);
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);

CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id INTEGER PRIMARY KEY,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    content,
    tenant_id UNINDEXED,
    classification_level UNINDEXED,
    content='chunks',
    content_rowid='id',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, content, tenant_id, classification_level)
    VALUES (new.id, new.content, new.tenant_id, new.classification_level);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, content, tenant_id, classification_level)
    VALUES('delete', old.id, old.content, old.tenant_id, old.classification_level);
END;

CREATE TABLE IF NOT EXISTS documents_ready (
    document_id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    ready INTEGER NOT NULL
);
";

/// SQL to check if the chunk index schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to read the schema version.
pub const GET_VERSION_SQL: &str = "SELECT value FROM schema_info WHERE key = 'version';";

/// SQL to write the schema version.
pub const SET_VERSION_SQL: &str = "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_creates_chunks_fts() {
        assert!(SCHEMA_SQL.contains("CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts"));
    }

    #[test]
    fn test_schema_version_nonzero() {
        const _: () = assert!(CURRENT_SCHEMA_VERSION >= 1);
    }
}
