//! The top-level façade: wires configuration, the chunk index, the fact
//! store, the ontology, and the orchestrator into the four operations a
//! caller (the CLI, or any future embedder of this crate) actually needs.
//!
//! Mirrors the teacher's `cli::commands::execute` composition root, which
//! built one `SqliteStorage` from `Cli.db_path` and threaded it through
//! every command; here the same "open once, hand out `Arc`s" shape builds
//! five services instead of one.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::access::UserContext;
use crate::config::EngineConfig;
use crate::core::document::{Document, DocumentStatus};
use crate::core::fact::Fact;
use crate::embedding::{Embedder, create_embedder};
use crate::error::Result;
use crate::factstore::guardrails::GuardrailConfig;
use crate::factstore::store::{FactQuery, FactStore, SqliteFactStore};
use crate::ingest::{hash_file_bytes, now_unix, route_and_extract};
use crate::ontology::Ontology;
use crate::orchestrator::concurrency::CancellationToken;
use crate::orchestrator::{Answer, AnswerOptions, Orchestrator};
use crate::retrieval::cache::QueryCache;
use crate::retrieval::index::{ChunkIndex, chunk_blocks};
use crate::retrieval::{HybridRetriever, RetrievalStrategy};
use rusqlite::Connection;

/// A snapshot of store occupancy, for the CLI `status` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EngineStatus {
    /// Number of indexed chunks across every tenant.
    pub chunk_count: i64,
    /// Number of fact rows visible to the querying context's tenant.
    pub fact_count: usize,
}

/// Owns every long-lived service and exposes the operations a caller needs:
/// submit a document, check on it, ask a question, or query facts directly.
///
/// Built once per process (or per test) from an [`EngineConfig`]; every
/// method takes the caller's [`UserContext`] explicitly rather than
/// consulting ambient state, per the access-control model documented on
/// [`crate::access`].
pub struct Engine {
    index: Arc<ChunkIndex>,
    embedder: Arc<dyn Embedder>,
    retriever: Arc<HybridRetriever>,
    orchestrator: Orchestrator,
    ontology: Arc<RwLock<Ontology>>,
    fact_store: Arc<Mutex<Box<dyn FactStore>>>,
}

impl Engine {
    /// Opens (creating on first run) the chunk index and fact store at
    /// `config.db_path`, loads the ontology and guardrail configuration,
    /// and assembles the retriever and orchestrator around them.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its schema
    /// created, or if the ontology or guardrail files cannot be read or
    /// fail to parse.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut index = ChunkIndex::new(Connection::open(&config.db_path)?);
        index.init()?;
        let index = Arc::new(index);

        let mut fact_store: Box<dyn FactStore> = Box::new(SqliteFactStore::new(Connection::open(&config.db_path)?));
        fact_store.init()?;
        let fact_store = Arc::new(Mutex::new(fact_store));

        let ontology = Ontology::load(&config.ontology_path)?.into_reloadable();
        let guardrails = GuardrailConfig::load(&config.guardrails_path)?;

        let embedder: Arc<dyn Embedder> = create_embedder()?.into();

        let cache = QueryCache::new(config.cache.query_cache_ttl_seconds, config.cache.query_cache_capacity);
        let retriever = Arc::new(
            HybridRetriever::new(Arc::clone(&index), Arc::clone(&embedder), config.retrieval).with_cache(cache),
        );

        let orchestrator = Orchestrator::new(
            Arc::clone(&retriever),
            Arc::clone(&fact_store),
            Arc::clone(&ontology),
            guardrails,
            crate::core::period::FiscalCalendar::default(),
            config.concurrency.max_concurrent_queries,
        );

        Ok(Self { index, embedder, retriever, orchestrator, ontology, fact_store })
    }

    /// Removes the backing database file, if any, then reopens a fresh
    /// store at the same path. Used by the CLI `reset` command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed, or if
    /// reopening fails.
    pub fn reset(config: &EngineConfig) -> Result<Self> {
        if config.db_path.exists() {
            std::fs::remove_file(&config.db_path)?;
        }
        Self::open(config)
    }

    /// Extracts, chunks, embeds, and indexes `file_bytes`. Returns the
    /// resulting [`Document`] in `Ready` state, or in `Failed` state with
    /// `error` set if extraction itself failed — extraction failure is not
    /// propagated as an `Err` since the caller still gets a document
    /// record to inspect.
    ///
    /// # Errors
    ///
    /// Returns an error if chunk or embedding persistence fails once
    /// extraction has already succeeded.
    pub fn submit_document(
        &self,
        file_bytes: &[u8],
        file_name: &str,
        tenant_id: &str,
        uploaded_by: &str,
        classification_level: crate::core::fact::ClassificationLevel,
    ) -> Result<Document> {
        let file_hash = hash_file_bytes(file_bytes);
        let document_id = format!("doc-{file_hash}");
        let mut document = Document::new(
            document_id.clone(),
            file_name,
            file_hash,
            tenant_id,
            uploaded_by,
            now_unix(),
            classification_level,
        );

        let ingest_result =
            match route_and_extract(file_bytes, file_name, &document_id, tenant_id, classification_level) {
                Ok(result) => result,
                Err(err) => {
                    document.mark_failed(err.to_string());
                    return Ok(document);
                }
            };

        document.status = DocumentStatus::Indexing;
        let chunks = chunk_blocks(&document_id, tenant_id, classification_level, &ingest_result.blocks);
        for chunk in &chunks {
            let row_id = self.index.upsert_chunk(chunk)?;
            if let Ok(embedding) = self.embedder.embed(&chunk.text) {
                self.index.upsert_embedding(row_id, &embedding)?;
            }
        }
        self.index.set_document_ready(&document_id, tenant_id, true)?;
        self.retriever.invalidate_cache_for_tenant(tenant_id);

        document.status = DocumentStatus::Ready;
        Ok(document)
    }

    /// Answers `question` on behalf of `user_ctx`, with a fresh (never
    /// pre-cancelled) cancellation token.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::answer`].
    pub fn answer(&self, question: &str, user_ctx: &UserContext, options: &AnswerOptions) -> Result<Answer> {
        self.orchestrator.answer(question, user_ctx, options, &CancellationToken::new())
    }

    /// Queries the fact store directly, bypassing retrieval entirely. Used
    /// by the CLI `facts` command for exact metric/period lookups.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying query fails.
    pub fn query_facts(&self, user_ctx: &UserContext, query: &FactQuery) -> Result<Vec<Fact>> {
        self.fact_store.lock().query_facts(user_ctx, query)
    }

    /// Reloads the ontology from `path` in place; in-flight readers keep
    /// their current snapshot until they next acquire the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the new file fails to load or validate.
    pub fn reload_ontology(&self, path: &Path) -> Result<()> {
        Ontology::reload(&self.ontology, path)
    }

    /// A cheap occupancy snapshot for the CLI `status` command.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk count or fact count query fails.
    pub fn status(&self, user_ctx: &UserContext) -> Result<EngineStatus> {
        let chunk_count = self.index.chunk_count()?;
        let fact_count = self.fact_store.lock().query_facts(user_ctx, &FactQuery::default())?.len();
        Ok(EngineStatus { chunk_count, fact_count })
    }
}

/// Never reports anything other than `Full`/`FusedOnly`/etc; kept so call
/// sites that format a strategy string don't need a separate import.
#[must_use]
pub fn describe_strategy(strategy: RetrievalStrategy) -> &'static str {
    match strategy {
        RetrievalStrategy::Full => "full",
        RetrievalStrategy::FusedOnly => "fused",
        RetrievalStrategy::LexicalOnly => "lexical-only",
        RetrievalStrategy::DenseOnly => "dense-only",
        RetrievalStrategy::Cached => "cached",
    }
}
