//! Provenance value object.
//!
//! A [`SourceReference`] identifies exactly where a datum came from. It is
//! created once at extraction time and never mutated; every downstream
//! transformation (normalization, mapping, derivation) carries the original
//! reference forward or, for derived facts, synthesizes a new one that
//! points at its inputs. Formalizing this as a parseable value object (with
//! its own `Display` and `parse`) is what makes temp-path leaks and other
//! ad-hoc provenance strings impossible by construction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of source a fact or chunk was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    /// A text-bearing (native) PDF.
    PdfNative,
    /// A scanned PDF processed through OCR.
    PdfScanned,
    /// A spreadsheet workbook.
    Excel,
    /// A delimited text file.
    Csv,
    /// A word-processor document.
    Docx,
    /// A hypertext document.
    Html,
    /// A JSON document.
    Json,
    /// An XML document.
    Xml,
    /// A value produced by the derived-metric engine, not extracted directly.
    Calculated,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PdfNative => "pdf-native",
            Self::PdfScanned => "pdf-scanned",
            Self::Excel => "excel",
            Self::Csv => "csv",
            Self::Docx => "docx",
            Self::Html => "html",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Calculated => "calculated",
        };
        f.write_str(s)
    }
}

/// Identifies exactly where a datum came from.
///
/// Immutable once created. See the module documentation for the rationale
/// behind treating this as a parseable value object rather than an ad-hoc
/// string built up wherever provenance happens to be needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    /// Name of the source file (never a full filesystem path).
    pub file_name: String,
    /// Content digest of the source file, for dedup and change detection.
    pub file_hash: String,
    /// The kind of source.
    pub source_type: SourceType,
    /// 1-based page number, if applicable.
    pub page: Option<u32>,
    /// Sheet name, if applicable.
    pub sheet: Option<String>,
    /// A1-notation cell reference, if applicable.
    pub cell: Option<String>,
    /// The row's leading label, if applicable.
    pub row_label: Option<String>,
    /// The column's header label, if applicable.
    pub column_label: Option<String>,
    /// Index of the table on its page/sheet, if applicable.
    pub table_index: Option<u32>,
    /// Bounding box `(x0, y0, x1, y1)` for PDF tables, if applicable.
    pub bbox: Option<(f32, f32, f32, f32)>,
    /// Tag identifying the extractor, engine, and parameters used.
    pub extraction_method: String,
    /// When the value was extracted, as a Unix timestamp.
    pub extracted_at: i64,
    /// Extractor/mapper confidence in `[0, 1]`.
    pub confidence: f32,
}

impl SourceReference {
    /// Starts building a reference for a PDF table cell.
    #[must_use]
    pub fn pdf_table(
        file_name: impl Into<String>,
        file_hash: impl Into<String>,
        page: u32,
        table_index: u32,
        row_label: impl Into<String>,
        extraction_method: impl Into<String>,
        extracted_at: i64,
        confidence: f32,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_hash: file_hash.into(),
            source_type: SourceType::PdfNative,
            page: Some(page),
            sheet: None,
            cell: None,
            row_label: Some(row_label.into()),
            column_label: None,
            table_index: Some(table_index),
            bbox: None,
            extraction_method: extraction_method.into(),
            extracted_at,
            confidence,
        }
    }

    /// Starts building a reference for a spreadsheet cell.
    #[must_use]
    pub fn spreadsheet_cell(
        file_name: impl Into<String>,
        file_hash: impl Into<String>,
        sheet: impl Into<String>,
        cell: impl Into<String>,
        extraction_method: impl Into<String>,
        extracted_at: i64,
        confidence: f32,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_hash: file_hash.into(),
            source_type: SourceType::Excel,
            page: None,
            sheet: Some(sheet.into()),
            cell: Some(cell.into()),
            row_label: None,
            column_label: None,
            table_index: None,
            bbox: None,
            extraction_method: extraction_method.into(),
            extracted_at,
            confidence,
        }
    }

    /// Starts building a reference for a page of narrative text.
    #[must_use]
    pub fn narrative(
        file_name: impl Into<String>,
        file_hash: impl Into<String>,
        source_type: SourceType,
        page: Option<u32>,
        extraction_method: impl Into<String>,
        extracted_at: i64,
        confidence: f32,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_hash: file_hash.into(),
            source_type,
            page,
            sheet: None,
            cell: None,
            row_label: None,
            column_label: None,
            table_index: None,
            bbox: None,
            extraction_method: extraction_method.into(),
            extracted_at,
            confidence,
        }
    }

    /// Builds a synthetic reference for a derived (calculated) fact.
    #[must_use]
    pub fn calculated(formula: &str, metric_id: &str, inputs: &[String], extracted_at: i64) -> Self {
        let inline = format!(
            "calculated/{metric_id}|formula:{formula}|inputs:[{}]",
            inputs.join(",")
        );
        Self {
            file_name: inline,
            file_hash: String::new(),
            source_type: SourceType::Calculated,
            page: None,
            sheet: None,
            cell: None,
            row_label: None,
            column_label: None,
            table_index: None,
            bbox: None,
            extraction_method: "derived-metric-engine".to_string(),
            extracted_at,
            confidence: 1.0,
        }
    }

    /// Returns a rank used to break election ties deterministically: the
    /// canonical string form compared byte-for-byte.
    #[must_use]
    pub fn tie_break_key(&self) -> String {
        self.to_string()
    }

    /// Specificity rank used by fact election: narrower scope wins.
    /// Higher is more specific.
    #[must_use]
    pub fn specificity_rank(&self) -> u8 {
        if self.cell.is_some() {
            3
        } else if self.table_index.is_some() {
            2
        } else if self.page.is_some() {
            1
        } else {
            0
        }
    }

    /// Source-quality rank used by fact election: extractor-method
    /// priority. Higher is better.
    #[must_use]
    pub fn quality_rank(&self) -> u8 {
        match self.source_type {
            SourceType::Calculated => 0,
            SourceType::PdfScanned => 1,
            SourceType::Html | SourceType::Json | SourceType::Xml | SourceType::Csv => 2,
            SourceType::Excel | SourceType::Docx => 3,
            SourceType::PdfNative => {
                if self.table_index.is_some() {
                    4
                } else {
                    3
                }
            }
        }
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source_type == SourceType::Calculated {
            return f.write_str(&self.file_name);
        }
        if let (Some(sheet), Some(cell)) = (&self.sheet, &self.cell) {
            return write!(f, "{}|sheet:{}|cell:{}", self.file_name, sheet, cell);
        }
        if let Some(page) = self.page {
            if let (Some(table_index), Some(row_label)) = (self.table_index, &self.row_label) {
                return write!(
                    f,
                    "{}|p.{}|tab:{}|row:{}",
                    self.file_name, page, table_index, row_label
                );
            }
            return write!(f, "{}|p.{}", self.file_name, page);
        }
        write!(f, "{}", self.file_name)
    }
}
