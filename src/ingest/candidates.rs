//! Raw `(label, value)` candidate pairing, shared by the table and
//! narrative extraction paths.
//!
//! Extraction never normalizes numbers or maps labels to canonical metrics
//! — that is `normalize` and `ontology`'s job. This module
//! only locates plausible label/number pairs and stamps them with
//! provenance.

use crate::core::source_ref::SourceReference;
use regex::Regex;
use std::sync::OnceLock;

/// A raw, unnormalized candidate fact discovered during extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricCandidate {
    /// The raw row/cell/sentence label, unmapped.
    pub label: String,
    /// The raw numeric token, unnormalized.
    pub raw_value: String,
    /// Provenance of this candidate.
    pub source_ref: SourceReference,
}

fn numeric_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[-(]?\s?[€$£¥]?\s?\d[\d.,]*\s?%?\)?").expect("valid regex")
    })
}

/// Pairs each table row's leading label with the last numeric cell in the
/// row — the most-recent-period column convention — and
/// stamps each pairing with a cell-level `source_ref` built from
/// `cell_ref(row, col)`.
///
/// `rows` is a rectangular grid of cell text, `header_row` (if known) is
/// skipped.
#[must_use]
pub fn pair_table_row<F>(row: &[String], row_index: usize, cell_ref: F) -> Option<MetricCandidate>
where
    F: Fn(usize, usize) -> SourceReference,
{
    let label = row.first()?.trim();
    if label.is_empty() || label.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }

    let (col, raw_value) = row
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .find(|(_, cell)| numeric_token_regex().is_match(cell))?;

    Some(MetricCandidate {
        label: label.to_string(),
        raw_value: raw_value.trim().to_string(),
        source_ref: cell_ref(row_index, col),
    })
}

/// Scans `text` for `label: number` / `label number unit` patterns
/// (`"Ricavi: 1.234.567,89 €"`, `"EBITDA margin 16%"`) and pairs each with
/// `source_ref` (identical for every candidate found in this block, since
/// narrative text carries page-level, not cell-level, provenance).
#[must_use]
pub fn pair_narrative_text(text: &str, source_ref: &SourceReference) -> Vec<MetricCandidate> {
    let mut candidates = Vec::new();
    for line in text.lines() {
        let Some(m) = numeric_token_regex().find(line) else {
            continue;
        };
        let label = line[..m.start()].trim_end_matches([':', '-', '\u{2013}', ' ']).trim();
        if label.is_empty() || label.len() > 80 {
            continue;
        }
        candidates.push(MetricCandidate {
            label: label.to_string(),
            raw_value: m.as_str().trim().to_string(),
            source_ref: source_ref.clone(),
        });
    }
    candidates
}
