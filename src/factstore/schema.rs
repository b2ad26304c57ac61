//! Database schema for the fact store.
//!
//! Mirrors the teacher's `storage::schema` module: one `SCHEMA_SQL` batch
//! applied idempotently, a version row for future migrations.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for the fact store's dimensional tables.
///
/// `facts` is a single wide fact table rather than a normalized star
/// schema with separate dimension tables: the dimension values (entity,
/// metric, period, scenario, perimeter) are low-cardinality strings
/// indexed directly, which keeps every query a single-table scan instead
/// of a join, at the cost of some denormalization. This follows the
/// teacher's own `chunks`/`chunk_embeddings` layout, which favors a flat
/// table plus targeted indices over a fully normalized schema.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS facts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    metric_id TEXT NOT NULL,
    value TEXT,
    unit TEXT NOT NULL,
    currency TEXT,
    period_type TEXT NOT NULL,
    period_year INTEGER NOT NULL,
    period_index INTEGER NOT NULL,
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    period_str TEXT NOT NULL,
    scenario TEXT NOT NULL,
    perimeter TEXT NOT NULL,
    dimensions TEXT NOT NULL,
    dimensions_hash INTEGER NOT NULL,
    source_ref TEXT NOT NULL,
    calculated_from TEXT,
    formula TEXT,
    quality_flags TEXT NOT NULL,
    classification_level TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    authoritative INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_facts_metric_period
    ON facts(tenant_id, metric_id, period_str);

CREATE INDEX IF NOT EXISTS idx_facts_entity
    ON facts(tenant_id, entity_id);

CREATE INDEX IF NOT EXISTS idx_facts_dedup
    ON facts(tenant_id, entity_id, metric_id, period_str, scenario, perimeter, dimensions_hash);

CREATE TABLE IF NOT EXISTS documents (
    document_id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    file_hash TEXT NOT NULL,
    uploaded_by TEXT NOT NULL,
    uploaded_at INTEGER NOT NULL,
    page_count INTEGER,
    classification_level TEXT NOT NULL,
    status TEXT NOT NULL,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_documents_tenant ON documents(tenant_id);

CREATE TABLE IF NOT EXISTS entity_grants (
    tenant_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    PRIMARY KEY (tenant_id, user_id, entity_id)
);
";

/// SQL to check if the fact store schema is initialized.
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
    fn test_schema_sql_creates_facts_table() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS facts"));
    }

    #[test]
    fn test_schema_version_nonzero() {
        const _: () = assert!(CURRENT_SCHEMA_VERSION >= 1);
    }
}
