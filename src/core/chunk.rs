//! Retrieval-unit representation.
//!
//! A [`Chunk`] is a retrieval-sized piece of a document carrying text, a
//! dense embedding, and a lexical term bag. Chunks are created once per
//! ingest and are immutable; re-indexing creates new chunks. Adapted from
//! the teacher's buffer-chunking model: where the teacher assigned chunk
//! identity via an autoincrement row id (fine for a single-user REPL), this
//! crate derives `chunk_id` deterministically from `(document_id,
//! source_ref)` so that re-ingesting identical bytes produces the same
//! chunk set, keeping re-ingestion idempotent.

use crate::core::source_ref::SourceReference;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// The structural role a chunk plays within its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Running narrative text.
    Narrative,
    /// A textualized table.
    Table,
    /// A table or figure caption.
    Caption,
}

/// A retrieval-sized piece of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic identifier derived from `(document_id, source_ref,
    /// text)`.
    pub chunk_id: String,
    /// Owning document.
    pub document_id: String,
    /// Provenance of this chunk's content.
    pub source_ref: SourceReference,
    /// Structural role.
    pub kind: ChunkKind,
    /// Chunk text (for tables: the textualized form preserving row/column
    /// headers).
    pub text: String,
    /// Dense embedding, if computed. `None` before indexing completes.
    pub embedding: Option<Vec<f32>>,
    /// Tokenized bag of lexical terms (lowercased, punctuation-stripped).
    pub lexical_terms: Vec<String>,
    /// Owning tenant.
    pub tenant_id: String,
    /// Classification level, for row-level masking at query time.
    pub classification_level: crate::core::fact::ClassificationLevel,
}

impl Chunk {
    /// Builds a new chunk, deriving its `chunk_id` from its identity fields.
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        source_ref: SourceReference,
        kind: ChunkKind,
        text: String,
        tenant_id: impl Into<String>,
        classification_level: crate::core::fact::ClassificationLevel,
    ) -> Self {
        let document_id = document_id.into();
        let tenant_id = tenant_id.into();
        let chunk_id = derive_chunk_id(&document_id, &source_ref, &text);
        let lexical_terms = tokenize(&text);
        Self {
            chunk_id,
            document_id,
            source_ref,
            kind,
            text,
            embedding: None,
            lexical_terms,
            tenant_id,
            classification_level,
        }
    }

    /// Estimates token count using the ~4-characters-per-token heuristic
    /// used throughout the ingest/retrieval pipeline for budgeting.
    #[must_use]
    pub fn estimate_tokens(&self) -> usize {
        self.text.len().div_ceil(4)
    }

    /// Returns a preview of the chunk text (first `max_len` characters, on
    /// a valid UTF-8 boundary).
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.text.len() <= max_len {
            &self.text
        } else {
            let mut boundary = max_len;
            while !self.text.is_char_boundary(boundary) && boundary > 0 {
                boundary -= 1;
            }
            &self.text[..boundary]
        }
    }
}

/// Derives a stable chunk id from a document id, its source reference, and
/// its text content.
fn derive_chunk_id(document_id: &str, source_ref: &SourceReference, text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    document_id.hash(&mut hasher);
    source_ref.to_string().hash(&mut hasher);
    text.hash(&mut hasher);
    format!("{document_id}:{:016x}", hasher.finish())
}

/// Lowercases, strips punctuation, and splits on whitespace to produce a
/// lexical term bag for BM25 indexing.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    normalized
        .split_whitespace()
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
