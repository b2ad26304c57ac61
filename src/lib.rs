//! # fincore
//!
//! A retrieval-augmented question-answering and metric-extraction engine
//! for heterogeneous financial documents.
//!
//! Five subsystems compose into one [`orchestrator::Orchestrator`]: ingest
//! routing and extraction ([`ingest`]), locale-aware normalization and
//! ontology mapping ([`normalize`], [`ontology`]), hybrid lexical/dense
//! retrieval ([`retrieval`]), a guardrail-checked fact store
//! ([`factstore`]), and multi-tenant access control ([`access`]).
//!
//! ## Features
//!
//! - **Heterogeneous ingest**: PDF, Excel, HTML, and CSV extraction behind
//!   one dispatch table
//! - **Hybrid retrieval**: BM25 + dense search, fused and optionally
//!   reranked
//! - **Guardrailed facts**: dimensional coherence and range-sanity checks
//!   before a fact is marked authoritative
//! - **Tenant-scoped access**: classification-level masking enforced at
//!   the query layer, not as a post-filter

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod access;
pub mod cli;
pub mod config;
pub mod core;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod factstore;
pub mod ingest;
pub mod normalize;
pub mod ontology;
pub mod orchestrator;
pub mod retrieval;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{
    CanonicalMetric, Chunk, ChunkKind, ClassificationLevel, Document, DocumentStatus, Fact,
    FiscalCalendar, Perimeter, PeriodKey, Scenario, SourceReference,
};

// Re-export access-control types
pub use access::{MaskPolicy, Role, UserContext};

// Re-export engine configuration and the top-level façade
pub use config::EngineConfig;
pub use engine::Engine;

// Re-export the query orchestrator
pub use orchestrator::{Answer, AnswerOptions, Orchestrator, QuestionIntent};

// Re-export embedding types
#[cfg(feature = "fastembed-embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use embedding::{
    DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder, cosine_similarity, create_embedder,
};

// Re-export retrieval types
pub use retrieval::{HybridRetriever, RetrievalFilters, RetrievalStrategy, ScoredChunk};

// Re-export fact-store types
pub use factstore::{FactStore, GuardrailConfig, SqliteFactStore};

// Re-export ontology types
pub use ontology::Ontology;

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
