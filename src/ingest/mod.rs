//! Ingest routing and extraction.
//!
//! Replaces dynamic duck-typed dispatch on extractor objects with a
//! discriminated [`SourceFormat`]
//! enum and one extractor function per variant; [`route_and_extract`] owns
//! the dispatch table rather than leaving it to polymorphic extractor
//! objects. Mirrors the teacher's `chunking::create_chunker` factory
//! pattern: one flat match over a format tag, not a trait-object registry.

pub mod candidates;
pub mod extractors;

use crate::core::fact::ClassificationLevel;
use crate::core::source_ref::SourceReference;
use crate::error::{IngestError, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub use candidates::MetricCandidate;

/// Content digest used as `SourceReference::file_hash` / `Document::file_hash`.
/// Uses the same `DefaultHasher` convention as `core::fact::hash_dimensions`
/// and `core::chunk::derive_chunk_id` rather than pulling in a cryptographic
/// digest crate for a dedup/change-detection key that is never a security
/// boundary.
#[must_use]
pub fn hash_file_bytes(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Current Unix timestamp, stamped onto every `SourceReference` an
/// extractor builds.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The structural role of an extracted block, before chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Running narrative text.
    Narrative,
    /// A textualized table.
    Table,
    /// A table or figure caption.
    Caption,
}

/// A single extracted block of a document, not yet chunked or embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedBlock {
    /// Structural role.
    pub kind: BlockKind,
    /// Textualized content (for tables: row/column headers preserved
    /// inline).
    pub text: String,
    /// Provenance of this block.
    pub source_ref: SourceReference,
}

/// The outcome of routing and extracting one document.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestResult {
    /// Assigned document id.
    pub document_id: String,
    /// Extracted blocks, in document order.
    pub blocks: Vec<ExtractedBlock>,
    /// Raw, unnormalized `(label, value)` candidates discovered during
    /// extraction. Normalization and ontology mapping happen downstream in
    /// `normalize` and `ontology`, never here.
    pub candidates: Vec<MetricCandidate>,
    /// Page/sheet locators that failed extraction without failing the
    /// whole document.
    pub partial_failures: Vec<String>,
}

/// The source format a document routes to, decided by magic bytes first,
/// extension second, content sniff third.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Text-bearing PDF.
    PdfNative,
    /// Image-only / scanned PDF, routed through OCR before the native path.
    PdfScanned,
    /// Spreadsheet workbook (`.xlsx`, `.xls`, `.ods`).
    Spreadsheet,
    /// Delimited text.
    Csv,
    /// Word-processor document.
    Docx,
    /// Hypertext document.
    Html,
    /// JSON document.
    Json,
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];

/// Classifies `bytes`/`file_name` into a [`SourceFormat`]: magic bytes
/// first, extension second, a content sniff third.
///
/// # Errors
///
/// Returns [`IngestError::UnsupportedFormat`] if no extractor claims the
/// file.
pub fn detect_format(bytes: &[u8], file_name: &str) -> Result<SourceFormat> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(if looks_text_bearing(bytes) {
            SourceFormat::PdfNative
        } else {
            SourceFormat::PdfScanned
        });
    }

    let extension = file_name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Ok(SourceFormat::PdfNative),
        "xlsx" | "xls" | "xlsm" | "ods" => Ok(SourceFormat::Spreadsheet),
        "csv" | "tsv" => Ok(SourceFormat::Csv),
        "docx" => Ok(SourceFormat::Docx),
        "html" | "htm" => Ok(SourceFormat::Html),
        "json" => Ok(SourceFormat::Json),
        _ if bytes.starts_with(ZIP_MAGIC) => Ok(SourceFormat::Spreadsheet),
        _ => {
            let sniffed = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
            let trimmed = sniffed.trim_start();
            if trimmed.starts_with('<') && trimmed.to_ascii_lowercase().contains("<html") {
                Ok(SourceFormat::Html)
            } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
                Ok(SourceFormat::Json)
            } else {
                Err(IngestError::UnsupportedFormat {
                    detail: format!("could not classify {extension} content"),
                }
                .into())
            }
        }
    }
}

/// A text-bearing PDF has a reasonable density of printable ASCII/Latin
/// text operators; a pure-image PDF's extracted text is near-empty. This is
/// a coarse heuristic run before the real extraction pass, not the final
/// word.
fn looks_text_bearing(bytes: &[u8]) -> bool {
    let sample_len = bytes.len().min(65_536);
    let text_marker_count = bytes[..sample_len]
        .windows(2)
        .filter(|w| *w == b"Tj" || *w == b"TJ")
        .count();
    text_marker_count > 0
}

/// Routes `file_bytes` to the appropriate extractor and returns its result.
///
/// # Errors
///
/// Returns [`IngestError::UnsupportedFormat`] if the file type cannot be
/// classified, or [`IngestError::ExtractionFailed`] if every extractor
/// registered for the detected format returned no content.
pub fn route_and_extract(
    file_bytes: &[u8],
    file_name: &str,
    document_id: &str,
    tenant_id: &str,
    classification_level: ClassificationLevel,
) -> Result<IngestResult> {
    let format = detect_format(file_bytes, file_name)?;

    let mut result = match format {
        SourceFormat::PdfNative => {
            extractors::pdf::extract(file_bytes, file_name, document_id, tenant_id, classification_level)?
        }
        SourceFormat::PdfScanned => extractors::scanned::extract(
            file_bytes,
            file_name,
            document_id,
            tenant_id,
            classification_level,
            &extractors::scanned::NullOcrEngine,
        )?,
        SourceFormat::Spreadsheet => extractors::spreadsheet::extract(
            file_bytes,
            file_name,
            document_id,
            tenant_id,
            classification_level,
        )?,
        SourceFormat::Csv => {
            extractors::csv_json::extract_csv(file_bytes, file_name, document_id, tenant_id, classification_level)?
        }
        SourceFormat::Json => {
            extractors::csv_json::extract_json(file_bytes, file_name, document_id, tenant_id, classification_level)?
        }
        SourceFormat::Docx => {
            extractors::docx::extract(file_bytes, file_name, document_id, tenant_id, classification_level)?
        }
        SourceFormat::Html => {
            extractors::html::extract(file_bytes, file_name, document_id, tenant_id, classification_level)?
        }
    };

    if result.blocks.is_empty() {
        return Err(IngestError::ExtractionFailed {
            detail: format!("no content extracted from {file_name}"),
        }
        .into());
    }

    result.document_id = document_id.to_string();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension_xlsx() {
        assert_eq!(detect_format(b"not real bytes", "report.xlsx").unwrap(), SourceFormat::Spreadsheet);
    }

    #[test]
    fn test_detect_by_extension_csv() {
        assert_eq!(detect_format(b"a,b,c", "data.csv").unwrap(), SourceFormat::Csv);
    }

    #[test]
    fn test_detect_html_sniff_without_extension() {
        let bytes = b"<html><body>hello</body></html>";
        assert_eq!(detect_format(bytes, "upload").unwrap(), SourceFormat::Html);
    }

    #[test]
    fn test_detect_json_sniff_without_extension() {
        let bytes = b"{\"a\": 1}";
        assert_eq!(detect_format(bytes, "upload").unwrap(), SourceFormat::Json);
    }

    #[test]
    fn test_unclassifiable_errors() {
        assert!(detect_format(b"\x01\x02\x03garbage", "upload").is_err());
    }

    #[test]
    fn test_pdf_magic_bytes_without_text_markers_routes_scanned() {
        let mut bytes = PDF_MAGIC.to_vec();
        bytes.extend_from_slice(b"binary image stream, no text operators here");
        assert_eq!(detect_format(&bytes, "scan.pdf").unwrap(), SourceFormat::PdfScanned);
    }
}
