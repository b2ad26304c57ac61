//! Core domain models.
//!
//! Pure data structures shared across the ingest, retrieval, fact-store, and
//! access subsystems: provenance, periods, metrics, facts, chunks, and
//! documents. No I/O dependencies live here.

pub mod chunk;
pub mod document;
pub mod fact;
pub mod metric;
pub mod period;
pub mod source_ref;

pub use chunk::{Chunk, ChunkKind};
pub use document::{Document, DocumentStatus};
pub use fact::{
    ClassificationLevel, DedupKey, DerivationInput, Fact, Perimeter, QualityFlag, QualityLevel,
    Scenario,
};
pub use metric::{Bounds, CanonicalMetric, DerivableFrom, Domain, UnitKind};
pub use period::{FiscalCalendar, PeriodKey, PeriodType};
pub use source_ref::{SourceReference, SourceType};
