//! Hypertext document extraction.
//!
//! Every `<table>` element becomes one `kind = table` block, textualized row
//! by row; everything else on the page is collapsed into a single narrative
//! block so that prose figures (e.g. inline in a press release) still reach
//! `candidates::pair_narrative_text`.

use crate::core::fact::ClassificationLevel;
use crate::core::source_ref::{SourceReference, SourceType};
use crate::error::{IngestError, Result};
use crate::ingest::candidates::{pair_narrative_text, pair_table_row};
use crate::ingest::{hash_file_bytes, now_unix, BlockKind, ExtractedBlock, IngestResult};
use scraper::{ElementRef, Html, Selector};

const EXTRACTION_METHOD: &str = "scraper";

/// Extracts table and narrative blocks from an HTML document.
///
/// # Errors
///
/// Returns [`IngestError::ExtractionFailed`] if the document contains
/// neither tables nor extractable body text.
pub fn extract(
    bytes: &[u8],
    file_name: &str,
    _document_id: &str,
    _tenant_id: &str,
    _classification_level: ClassificationLevel,
) -> Result<IngestResult> {
    let text = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&text);

    let file_hash = hash_file_bytes(bytes);
    let extracted_at = now_unix();

    let mut blocks = Vec::new();
    let mut candidates = Vec::new();

    let Ok(table_selector) = Selector::parse("table") else {
        return Err(IngestError::ExtractionFailed {
            detail: "invalid table selector".to_string(),
        }
        .into());
    };
    let Ok(row_selector) = Selector::parse("tr") else {
        return Err(IngestError::ExtractionFailed {
            detail: "invalid row selector".to_string(),
        }
        .into());
    };
    let Ok(cell_selector) = Selector::parse("td, th") else {
        return Err(IngestError::ExtractionFailed {
            detail: "invalid cell selector".to_string(),
        }
        .into());
    };

    for (table_index, table) in document.select(&table_selector).enumerate() {
        let rows: Vec<Vec<String>> = table
            .select(&row_selector)
            .map(|tr| {
                tr.select(&cell_selector)
                    .map(|cell| collect_text(&cell))
                    .collect::<Vec<_>>()
            })
            .filter(|row: &Vec<String>| !row.is_empty())
            .collect();

        if rows.is_empty() {
            continue;
        }

        let table_index_u32 = table_index_u32_for(table_index);
        let mut table_text = String::new();
        for (row_index, row) in rows.iter().enumerate() {
            table_text.push_str(&row.join("\t"));
            table_text.push('\n');
            if row_index == 0 {
                continue;
            }
            let row_label = row.first().cloned().unwrap_or_default();
            if let Some(candidate) = pair_table_row(row, row_index, |_r, _c| {
                SourceReference::pdf_table(
                    file_name,
                    file_hash.clone(),
                    1,
                    table_index_u32,
                    row_label.clone(),
                    EXTRACTION_METHOD,
                    extracted_at,
                    0.9,
                )
            }) {
                candidates.push(candidate);
            }
        }

        blocks.push(ExtractedBlock {
            kind: BlockKind::Table,
            text: table_text,
            source_ref: SourceReference::pdf_table(
                file_name,
                file_hash.clone(),
                1,
                table_index_u32,
                "*",
                EXTRACTION_METHOD,
                extracted_at,
                0.9,
            ),
        });
    }

    let body_text = document.root_element().text().collect::<Vec<_>>().join(" ");
    let narrative_source_ref = SourceReference::narrative(
        file_name,
        file_hash,
        SourceType::Html,
        None,
        EXTRACTION_METHOD,
        extracted_at,
        0.85,
    );
    let normalized_body = normalize_whitespace(&body_text);
    if !normalized_body.is_empty() {
        candidates.extend(pair_narrative_text(&normalized_body, &narrative_source_ref));
        blocks.push(ExtractedBlock {
            kind: BlockKind::Narrative,
            text: normalized_body,
            source_ref: narrative_source_ref,
        });
    }

    if blocks.is_empty() {
        return Err(IngestError::ExtractionFailed {
            detail: "no tables or narrative text found".to_string(),
        }
        .into());
    }

    Ok(IngestResult {
        document_id: String::new(),
        blocks,
        candidates,
        partial_failures: Vec::new(),
    })
}

fn table_index_u32_for(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

fn collect_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_table_rows() {
        let html = b"<html><body><table><tr><th>Voce</th><th>2024</th></tr>\
            <tr><td>Ricavi</td><td>1.000.000</td></tr></table></body></html>";
        let result = extract(html, "report.html", "doc-1", "acme", ClassificationLevel::Internal).unwrap();
        assert!(result.blocks.iter().any(|b| b.kind == BlockKind::Table));
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].label, "Ricavi");
    }

    #[test]
    fn test_narrative_fallback_when_no_tables() {
        let html = b"<html><body><p>Ricavi: 500.000 euro</p></body></html>";
        let result = extract(html, "note.html", "doc-1", "acme", ClassificationLevel::Internal).unwrap();
        assert!(result.blocks.iter().any(|b| b.kind == BlockKind::Narrative));
    }

    #[test]
    fn test_empty_document_errors() {
        let html = b"<html><body></body></html>";
        assert!(extract(html, "empty.html", "doc-1", "acme", ClassificationLevel::Internal).is_err());
    }
}
