//! Scanned (image-only) PDF extraction, routed through an OCR backend.
//!
//! OCR is pluggable behind [`OcrEngine`] because this stack carries no OCR
//! crate by default; [`NullOcrEngine`] is the no-op implementation wired in
//! when no backend is configured, and it always declines with
//! [`IngestError::OcrUnavailable`]. A real backend (e.g. a `tesseract`
//! binding) implements the same trait and is swapped in at the call site in
//! `ingest::route_and_extract`.

use crate::core::fact::ClassificationLevel;
use crate::core::source_ref::{SourceReference, SourceType};
use crate::error::{IngestError, Result};
use crate::ingest::candidates::pair_narrative_text;
use crate::ingest::{hash_file_bytes, now_unix, BlockKind, ExtractedBlock, IngestResult};

/// A pluggable OCR backend. Implementations return the recognized text for
/// one page image along with their own confidence estimate in `[0, 1]`.
pub trait OcrEngine {
    /// Runs OCR over `page_bytes`, returning recognized text and confidence.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::OcrUnavailable`] if no backend is configured
    /// or the backend itself fails.
    fn recognize(&self, page_bytes: &[u8]) -> Result<(String, f32)>;
}

/// The default OCR backend: always declines. Installed when no real OCR
/// engine is configured, so scanned PDFs fail extraction explicitly rather
/// than silently producing empty documents.
pub struct NullOcrEngine;

impl OcrEngine for NullOcrEngine {
    fn recognize(&self, _page_bytes: &[u8]) -> Result<(String, f32)> {
        Err(IngestError::OcrUnavailable.into())
    }
}

const EXTRACTION_METHOD: &str = "ocr";

/// Confidence discount applied to OCR-derived text relative to native
/// extraction, mirroring `config::EngineConfig::ocr_confidence_discount`.
/// Kept as a local constant rather than threaded through this function's
/// signature because the discount is a property of the OCR path itself, not
/// of any one call site; `route_and_extract` does not carry an `EngineConfig`
/// reference and extractors are meant to stay config-free.
const OCR_CONFIDENCE_DISCOUNT: f32 = 0.8;

/// Extracts narrative blocks from a scanned PDF by running `ocr` over the
/// whole document once, treating it as a single page. A real backend splits
/// by page internally; since this crate's default [`NullOcrEngine`] never
/// succeeds, page-splitting exists only as a hook for a future backend.
///
/// # Errors
///
/// Returns [`IngestError::OcrUnavailable`] when `ocr` declines, or
/// [`IngestError::ExtractionFailed`] if OCR succeeds but yields no usable
/// text.
pub fn extract(
    bytes: &[u8],
    file_name: &str,
    _document_id: &str,
    _tenant_id: &str,
    _classification_level: ClassificationLevel,
    ocr: &dyn OcrEngine,
) -> Result<IngestResult> {
    let (text, raw_confidence) = ocr.recognize(bytes)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(IngestError::ExtractionFailed {
            detail: "OCR produced no text".to_string(),
        }
        .into());
    }

    let confidence = (raw_confidence * OCR_CONFIDENCE_DISCOUNT).clamp(0.0, 1.0);
    let file_hash = hash_file_bytes(bytes);
    let extracted_at = now_unix();

    let source_ref = SourceReference::narrative(
        file_name,
        file_hash,
        SourceType::PdfScanned,
        Some(1),
        EXTRACTION_METHOD,
        extracted_at,
        confidence,
    );

    let candidates = pair_narrative_text(trimmed, &source_ref);
    let blocks = vec![ExtractedBlock {
        kind: BlockKind::Narrative,
        text: trimmed.to_string(),
        source_ref,
    }];

    Ok(IngestResult {
        document_id: String::new(),
        blocks,
        candidates,
        partial_failures: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubOcr(&'static str, f32);

    impl OcrEngine for StubOcr {
        fn recognize(&self, _page_bytes: &[u8]) -> Result<(String, f32)> {
            Ok((self.0.to_string(), self.1))
        }
    }

    #[test]
    fn test_null_ocr_engine_declines() {
        let result = extract(b"scan", "x.pdf", "doc-1", "acme", ClassificationLevel::Internal, &NullOcrEngine);
        assert!(matches!(result, Err(crate::error::Error::Ingest(IngestError::OcrUnavailable))));
    }

    #[test]
    fn test_stub_ocr_discounts_confidence() {
        let ocr = StubOcr("Ricavi: 1.000.000", 0.9);
        let result = extract(b"scan", "x.pdf", "doc-1", "acme", ClassificationLevel::Internal, &ocr).unwrap();
        assert_eq!(result.blocks.len(), 1);
        let confidence = result.blocks[0].source_ref.confidence;
        assert!((confidence - 0.72).abs() < 0.001);
    }

    #[test]
    fn test_blank_ocr_result_fails_extraction() {
        let ocr = StubOcr("   ", 0.9);
        let result = extract(b"scan", "x.pdf", "doc-1", "acme", ClassificationLevel::Internal, &ocr);
        assert!(result.is_err());
    }
}
