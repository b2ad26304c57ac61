//! Ingested source document record.
//!
//! Adapted from the teacher's `Buffer` (a loaded text source held in a
//! session's working set). A [`Document`] carries the same "one row per
//! ingested file" shape but tracks the ingest pipeline's own progress
//! (`DocumentStatus`) instead of REPL buffer metadata, and is scoped to a
//! tenant from the moment it is created.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a document sits in the ingest pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentStatus {
    /// Uploaded, not yet picked up by an extractor.
    Pending,
    /// Extraction in progress.
    Extracting,
    /// Extraction complete, chunks being embedded and indexed.
    Indexing,
    /// Fully ingested and queryable.
    Ready,
    /// Ingest failed; see `error`.
    Failed,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A document uploaded for ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, assigned at upload time.
    pub document_id: String,
    /// Original file name as uploaded (never a filesystem path).
    pub file_name: String,
    /// Content digest of the uploaded bytes.
    pub file_hash: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// User id that performed the upload.
    pub uploaded_by: String,
    /// Unix timestamp of upload.
    pub uploaded_at: i64,
    /// Page count, once known (`None` for formats without pages).
    pub page_count: Option<u32>,
    /// Classification ceiling applied to every fact/chunk derived from this
    /// document unless an extractor assigns a narrower one.
    pub classification_level: crate::core::fact::ClassificationLevel,
    /// Current pipeline status.
    pub status: DocumentStatus,
    /// Error detail, set only when `status` is `Failed`.
    pub error: Option<String>,
}

impl Document {
    /// Creates a new document record in the `Pending` state.
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        file_name: impl Into<String>,
        file_hash: impl Into<String>,
        tenant_id: impl Into<String>,
        uploaded_by: impl Into<String>,
        uploaded_at: i64,
        classification_level: crate::core::fact::ClassificationLevel,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            file_name: file_name.into(),
            file_hash: file_hash.into(),
            tenant_id: tenant_id.into(),
            uploaded_by: uploaded_by.into(),
            uploaded_at,
            page_count: None,
            classification_level,
            status: DocumentStatus::Pending,
            error: None,
        }
    }

    /// Transitions to `Failed`, recording `reason`.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = DocumentStatus::Failed;
        self.error = Some(reason.into());
    }

    /// Whether this document can still be queried against (i.e. is not mid
    /// ingest and did not fail).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == DocumentStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fact::ClassificationLevel;

    fn sample() -> Document {
        Document::new(
            "doc-1",
            "bilancio.pdf",
            "deadbeef",
            "acme",
            "mario.rossi",
            1_700_000_000,
            ClassificationLevel::Internal,
        )
    }

    #[test]
    fn test_new_document_is_pending() {
        let doc = sample();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(!doc.is_ready());
    }

    #[test]
    fn test_mark_failed_records_reason() {
        let mut doc = sample();
        doc.mark_failed("unsupported format");
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error.as_deref(), Some("unsupported format"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DocumentStatus::Ready.to_string(), "ready");
    }
}
