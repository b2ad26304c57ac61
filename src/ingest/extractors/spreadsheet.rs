//! Spreadsheet workbook extraction (`.xlsx`, `.xls`, `.xlsm`, `.ods`).
//!
//! Each sheet becomes one `kind = table` block, textualized row by row with
//! its header and leading label carried inline for downstream lexical
//! indexing, and every numeric cell pairs with its
//! leading row label through [`candidates::pair_table_row`], stamped with a
//! per-cell `source_ref`.

use crate::core::fact::ClassificationLevel;
use crate::core::source_ref::SourceReference;
use crate::error::{IngestError, Result};
use crate::ingest::candidates::pair_table_row;
use crate::ingest::{hash_file_bytes, now_unix, BlockKind, ExtractedBlock, IngestResult};
use calamine::{Data, Reader};
use std::io::Cursor;

const EXTRACTION_METHOD: &str = "calamine";

/// Extracts one table block per sheet from a spreadsheet workbook.
///
/// # Errors
///
/// Returns [`IngestError::ExtractionFailed`] if the workbook cannot be
/// opened at all (corrupt file, unsupported container).
pub fn extract(
    bytes: &[u8],
    file_name: &str,
    _document_id: &str,
    _tenant_id: &str,
    _classification_level: ClassificationLevel,
) -> Result<IngestResult> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
        IngestError::ExtractionFailed {
            detail: format!("could not open workbook: {e}"),
        }
    })?;

    let file_hash = hash_file_bytes(bytes);
    let extracted_at = now_unix();
    let sheet_names = workbook.sheet_names();

    let mut blocks = Vec::new();
    let mut candidates = Vec::new();
    let mut partial_failures = Vec::new();

    for sheet_name in &sheet_names {
        let Ok(range) = workbook.worksheet_range(sheet_name) else {
            partial_failures.push(format!("sheet {sheet_name}: could not read range"));
            continue;
        };
        if range.is_empty() {
            continue;
        }

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
            .collect();

        let header_row_index = detect_header_row(&rows);
        let mut text = String::new();
        for (row_index, row) in rows.iter().enumerate() {
            text.push_str(&row.join("\t"));
            text.push('\n');
            if Some(row_index) == header_row_index {
                continue;
            }

            let sheet_name_owned = sheet_name.clone();
            let file_name_owned = file_name.to_string();
            let file_hash_owned = file_hash.clone();
            if let Some(candidate) = pair_table_row(row, row_index, |r, c| {
                cell_ref(&file_name_owned, &file_hash_owned, &sheet_name_owned, r, c, extracted_at)
            }) {
                candidates.push(candidate);
            }
        }

        blocks.push(ExtractedBlock {
            kind: BlockKind::Table,
            text,
            source_ref: SourceReference::spreadsheet_cell(
                file_name,
                file_hash.clone(),
                sheet_name.clone(),
                "*",
                EXTRACTION_METHOD,
                extracted_at,
                1.0,
            ),
        });
    }

    Ok(IngestResult {
        document_id: String::new(),
        blocks,
        candidates,
        partial_failures,
    })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{e:?}"),
    }
}

/// A sheet's header row is the first row whose non-empty cells are
/// predominantly non-numeric; a coarse heuristic, not a layout analyzer.
fn detect_header_row(rows: &[Vec<String>]) -> Option<usize> {
    rows.iter().position(|row| {
        let non_empty: Vec<&String> = row.iter().filter(|c| !c.is_empty()).collect();
        if non_empty.is_empty() {
            return false;
        }
        let numeric = non_empty
            .iter()
            .filter(|c| c.chars().next().is_some_and(|ch| ch.is_ascii_digit() || ch == '-'))
            .count();
        numeric * 2 < non_empty.len()
    })
}

fn cell_ref(
    file_name: &str,
    file_hash: &str,
    sheet_name: &str,
    row: usize,
    col: usize,
    extracted_at: i64,
) -> SourceReference {
    let cell = format!("{}{}", column_letter(col), row + 1);
    SourceReference::spreadsheet_cell(file_name, file_hash, sheet_name, cell, EXTRACTION_METHOD, extracted_at, 1.0)
}

/// Converts a zero-based column index into A1-notation letters (0 -> "A",
/// 25 -> "Z", 26 -> "AA").
fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        let remainder = col % 26;
        letters.push((b'A' + u8::try_from(remainder).unwrap_or(0)) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter_basic() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(1), "B");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
    }

    #[test]
    fn test_detect_header_row_first_text_row() {
        let rows = vec![
            vec!["Voce".to_string(), "2023".to_string(), "2024".to_string()],
            vec!["Ricavi".to_string(), "1000".to_string(), "1200".to_string()],
        ];
        assert_eq!(detect_header_row(&rows), Some(0));
    }

    #[test]
    fn test_corrupt_workbook_errors() {
        let result = extract(b"not a workbook", "x.xlsx", "doc-1", "acme", ClassificationLevel::Internal);
        assert!(result.is_err());
    }
}
