//! Delimited-text and JSON extraction.
//!
//! CSV is treated exactly like a one-sheet spreadsheet: one `kind = table`
//! block, per-cell provenance via row/column index. JSON is flattened one
//! level (object keys become labels, scalar leaves become candidate values)
//! since financial exports are typically a flat or near-flat record, not a
//! deeply nested document.

use crate::core::fact::ClassificationLevel;
use crate::core::source_ref::SourceReference;
use crate::error::{IngestError, Result};
use crate::ingest::candidates::{pair_table_row, MetricCandidate};
use crate::ingest::{hash_file_bytes, now_unix, BlockKind, ExtractedBlock, IngestResult};
use serde_json::Value;

const CSV_EXTRACTION_METHOD: &str = "csv";
const JSON_EXTRACTION_METHOD: &str = "json";

/// Extracts a single table block from delimited text.
///
/// # Errors
///
/// Returns [`IngestError::ExtractionFailed`] if the input cannot be read as
/// delimited text at all (no rows parsed, e.g. every row an error).
pub fn extract_csv(
    bytes: &[u8],
    file_name: &str,
    _document_id: &str,
    _tenant_id: &str,
    _classification_level: ClassificationLevel,
) -> Result<IngestResult> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(bytes);

    let file_hash = hash_file_bytes(bytes);
    let extracted_at = now_unix();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::ExtractionFailed {
            detail: format!("csv parse error: {e}"),
        })?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    if rows.is_empty() {
        return Err(IngestError::ExtractionFailed {
            detail: "no rows parsed".to_string(),
        }
        .into());
    }

    let mut text = String::new();
    let mut candidates = Vec::new();
    for (row_index, row) in rows.iter().enumerate() {
        text.push_str(&row.join("\t"));
        text.push('\n');
        if row_index == 0 {
            continue;
        }
        let file_name_owned = file_name.to_string();
        let file_hash_owned = file_hash.clone();
        if let Some(candidate) = pair_table_row(row, row_index, |r, c| {
            SourceReference::spreadsheet_cell(
                file_name_owned.clone(),
                file_hash_owned.clone(),
                "csv",
                format!("row{r}col{c}"),
                CSV_EXTRACTION_METHOD,
                extracted_at,
                1.0,
            )
        }) {
            candidates.push(candidate);
        }
    }

    let block = ExtractedBlock {
        kind: BlockKind::Table,
        text,
        source_ref: SourceReference::spreadsheet_cell(
            file_name,
            file_hash,
            "csv",
            "*",
            CSV_EXTRACTION_METHOD,
            extracted_at,
            1.0,
        ),
    };

    Ok(IngestResult {
        document_id: String::new(),
        blocks: vec![block],
        candidates,
        partial_failures: Vec::new(),
    })
}

/// Extracts candidate metrics from a JSON document, flattened one level.
///
/// # Errors
///
/// Returns [`IngestError::ExtractionFailed`] if the bytes are not valid
/// JSON.
pub fn extract_json(
    bytes: &[u8],
    file_name: &str,
    _document_id: &str,
    _tenant_id: &str,
    _classification_level: ClassificationLevel,
) -> Result<IngestResult> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| IngestError::ExtractionFailed {
        detail: format!("json parse error: {e}"),
    })?;

    let file_hash = hash_file_bytes(bytes);
    let extracted_at = now_unix();
    let source_ref = SourceReference::narrative(
        file_name,
        file_hash,
        crate::core::source_ref::SourceType::Json,
        None,
        JSON_EXTRACTION_METHOD,
        extracted_at,
        1.0,
    );

    let mut candidates = Vec::new();
    flatten_one_level("", &value, &source_ref, &mut candidates);

    let block = ExtractedBlock {
        kind: BlockKind::Narrative,
        text: value.to_string(),
        source_ref,
    };

    Ok(IngestResult {
        document_id: String::new(),
        blocks: vec![block],
        candidates,
        partial_failures: Vec::new(),
    })
}

fn flatten_one_level(prefix: &str, value: &Value, source_ref: &SourceReference, out: &mut Vec<MetricCandidate>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, v) in map {
        let label = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match v {
            Value::Number(n) => out.push(MetricCandidate {
                label,
                raw_value: n.to_string(),
                source_ref: source_ref.clone(),
            }),
            Value::String(s) => out.push(MetricCandidate {
                label,
                raw_value: s.clone(),
                source_ref: source_ref.clone(),
            }),
            Value::Object(_) => flatten_one_level(&label, v, source_ref, out),
            Value::Array(_) | Value::Bool(_) | Value::Null => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_csv_pairs_last_numeric_column() {
        let bytes = b"Voce,2023,2024\nRicavi,1000,1200\n";
        let result = extract_csv(bytes, "data.csv", "doc-1", "acme", ClassificationLevel::Internal).unwrap();
        assert_eq!(result.blocks.len(), 1);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].label, "Ricavi");
        assert_eq!(result.candidates[0].raw_value, "1200");
    }

    #[test]
    fn test_extract_csv_empty_errors() {
        assert!(extract_csv(b"", "empty.csv", "doc-1", "acme", ClassificationLevel::Internal).is_err());
    }

    #[test]
    fn test_extract_json_flattens_one_level() {
        let bytes = br#"{"ricavi": 1000000, "dettagli": {"margine": 0.16}}"#;
        let result = extract_json(bytes, "data.json", "doc-1", "acme", ClassificationLevel::Internal).unwrap();
        let labels: Vec<&str> = result.candidates.iter().map(|c| c.label.as_str()).collect();
        assert!(labels.contains(&"ricavi"));
        assert!(labels.contains(&"dettagli.margine"));
    }

    #[test]
    fn test_extract_json_invalid_errors() {
        assert!(extract_json(b"not json", "data.json", "doc-1", "acme", ClassificationLevel::Internal).is_err());
    }
}
