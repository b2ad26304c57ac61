//! Native (text-bearing) PDF extraction.
//!
//! `pdf-extract` gives us a flat text stream with no table/cell geometry, so
//! this extractor treats every PDF page as narrative text and defers
//! label/number pairing to [`candidates::pair_narrative_text`]. A true
//! table-aware PDF extractor (cell bounding boxes, column alignment) would
//! need a layout-analysis crate this stack does not carry; until then, PDF
//! figures are recovered at page granularity rather than cell granularity,
//! which is reflected in their lower `source_ref.quality_rank()` relative to
//! spreadsheet cells.

use crate::core::fact::ClassificationLevel;
use crate::core::source_ref::{SourceReference, SourceType};
use crate::error::{IngestError, Result};
use crate::ingest::candidates::pair_narrative_text;
use crate::ingest::{hash_file_bytes, now_unix, BlockKind, ExtractedBlock, IngestResult};

const EXTRACTION_METHOD: &str = "pdf-extract";
const NATIVE_CONFIDENCE: f32 = 0.95;

/// Extracts narrative blocks and candidate metrics from a native PDF.
///
/// # Errors
///
/// Returns [`IngestError::ExtractionFailed`] if `pdf-extract` cannot parse
/// the document at all (a malformed or encrypted PDF).
pub fn extract(
    bytes: &[u8],
    file_name: &str,
    _document_id: &str,
    _tenant_id: &str,
    _classification_level: ClassificationLevel,
) -> Result<IngestResult> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| IngestError::ExtractionFailed {
        detail: format!("pdf-extract failed: {e}"),
    })?;

    let file_hash = hash_file_bytes(bytes);
    let extracted_at = now_unix();

    let mut blocks = Vec::new();
    let mut candidates = Vec::new();
    let mut partial_failures = Vec::new();

    for (index, page_text) in text.split('\x0c').enumerate() {
        let page_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let trimmed = page_text.trim();
        if trimmed.is_empty() {
            partial_failures.push(format!("page {page_number}: no extractable text"));
            continue;
        }

        let source_ref = SourceReference::narrative(
            file_name,
            file_hash.clone(),
            SourceType::PdfNative,
            Some(page_number),
            EXTRACTION_METHOD,
            extracted_at,
            NATIVE_CONFIDENCE,
        );

        candidates.extend(pair_narrative_text(trimmed, &source_ref));

        blocks.push(ExtractedBlock {
            kind: BlockKind::Narrative,
            text: trimmed.to_string(),
            source_ref,
        });
    }

    Ok(IngestResult {
        document_id: String::new(),
        blocks,
        candidates,
        partial_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_pdf_errors() {
        let bytes = b"%PDF-1.4 not a real pdf body";
        let result = extract(bytes, "broken.pdf", "doc-1", "acme", ClassificationLevel::Internal);
        assert!(result.is_err());
    }
}
