//! Fuzzy label-to-metric mapping.

use crate::core::metric::Domain;
use crate::ontology::{Ontology, normalize_label};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use std::sync::OnceLock;

/// Minimum rescaled fuzzy score to accept a candidate at all.
const ACCEPT_THRESHOLD: f32 = 0.82;

/// If the best and second-best candidates are within this band and belong
/// to different domains, the match is rejected as ambiguous unless a
/// `domain_hint` breaks the tie.
const AMBIGUITY_BAND: f32 = 0.03;

/// Section-header / subtotal labels that never map to a metric on their
/// own but can scope the rows nested beneath them.
const EXCLUSION_LIST: &[&str] = &[
    "totale", "subtotale", "total", "subtotal", "attivo", "passivo", "assets", "liabilities",
];

fn matcher() -> &'static SkimMatcherV2 {
    static MATCHER: OnceLock<SkimMatcherV2> = OnceLock::new();
    MATCHER.get_or_init(SkimMatcherV2::default)
}

/// A candidate metric match produced by [`map_label`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricMatch {
    /// The matched canonical metric id.
    pub metric_id: String,
    /// Rescaled match confidence in `[0, 1]`.
    pub confidence: f32,
    /// Whether the match came through an exact synonym (vs. fuzzy scoring).
    pub via_synonym: bool,
}

/// Rescales a raw `SkimMatcherV2` score to `[0, 1]` by dividing by the
/// score the pattern gets against itself (its own best possible match).
fn rescaled_score(candidate: &str, pattern: &str) -> Option<f32> {
    let raw = matcher().fuzzy_match(candidate, pattern)?;
    let ceiling = matcher().fuzzy_match(pattern, pattern).unwrap_or(1).max(1);
    Some((raw as f32 / ceiling as f32).clamp(0.0, 1.0))
}

/// Maps a raw row/cell label to a canonical metric.
///
/// Returns `None` when the label is in the section-header exclusion list,
/// or when no candidate scores above [`ACCEPT_THRESHOLD`], or when the top
/// two candidates are within [`AMBIGUITY_BAND`] of each other and belong to
/// different domains with no `domain_hint` to disambiguate.
#[must_use]
pub fn map_label(ontology: &Ontology, raw_label: &str, domain_hint: Option<Domain>) -> Option<MetricMatch> {
    let normalized = normalize_label(raw_label);
    if normalized.is_empty() || EXCLUSION_LIST.contains(&normalized.as_str()) {
        return None;
    }

    if let Some(metric_id) = ontology.exact_synonym_match(&normalized) {
        return Some(MetricMatch {
            metric_id: metric_id.to_string(),
            confidence: 1.0,
            via_synonym: true,
        });
    }

    let mut scored: Vec<(String, f32, Domain)> = Vec::new();
    for metric in ontology.metrics() {
        let best = metric
            .synonyms
            .iter()
            .filter_map(|syn| rescaled_score(&normalize_label(syn), &normalized))
            .fold(0.0_f32, f32::max);
        if best > 0.0 {
            scored.push((metric.id.clone(), best, metric.domain));
        }
    }
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (best_id, best_score, best_domain) = scored.first()?.clone();
    if best_score < ACCEPT_THRESHOLD {
        return None;
    }

    if let Some((_, second_score, second_domain)) = scored.get(1) {
        let ambiguous = (best_score - second_score).abs() < AMBIGUITY_BAND && *second_domain != best_domain;
        if ambiguous {
            match domain_hint {
                Some(hint) if hint == best_domain => {}
                Some(hint) if hint == *second_domain => {
                    return Some(MetricMatch {
                        metric_id: scored[1].0.clone(),
                        confidence: *second_score,
                        via_synonym: false,
                    });
                }
                _ => return None,
            }
        }
    }

    Some(MetricMatch {
        metric_id: best_id,
        confidence: best_score,
        via_synonym: false,
    })
}

/// Maps every row label of a table, in order, carrying forward the most
/// recent excluded section header as scope context for nested rows.
///
/// Returns `(row_index, metric_match)` pairs for rows that mapped; rows in
/// the exclusion list or with no confident match are omitted, but a row
/// that only scopes its children (e.g. "Attivo") still consumes a row
/// index so downstream table reconstruction stays aligned.
#[must_use]
pub fn map_table(
    ontology: &Ontology,
    row_labels: &[String],
    domain_hint: Option<Domain>,
) -> Vec<(usize, MetricMatch)> {
    let mut results = Vec::new();
    for (index, label) in row_labels.iter().enumerate() {
        if let Some(metric_match) = map_label(ontology, label, domain_hint) {
            results.push((index, metric_match));
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r"
metrics:
  - id: ricavi
    display_name: Ricavi
    domain: finance-pl
    unit_kind: currency
    synonyms: [Ricavi, Revenue, Vendite nette]
  - id: costo_del_venduto
    display_name: Costo del Venduto
    domain: finance-pl
    unit_kind: currency
    synonyms: [Costo del Venduto, Cost of Goods Sold]
";

    fn ontology() -> Ontology {
        Ontology::from_yaml(SAMPLE_YAML).unwrap()
    }

    #[test]
    fn test_exact_match_scores_one() {
        let m = map_label(&ontology(), "Revenue", None).unwrap();
        assert_eq!(m.metric_id, "ricavi");
        assert!((m.confidence - 1.0).abs() < f32::EPSILON);
        assert!(m.via_synonym);
    }

    #[test]
    fn test_fuzzy_match_close_variant() {
        let m = map_label(&ontology(), "Ricavi netti", None);
        assert!(m.is_some());
    }

    #[test]
    fn test_exclusion_list_rejected() {
        assert!(map_label(&ontology(), "Totale", None).is_none());
        assert!(map_label(&ontology(), "Attivo", None).is_none());
    }

    #[test]
    fn test_unrelated_label_rejected() {
        assert!(map_label(&ontology(), "xyz completely unrelated text", None).is_none());
    }

    #[test]
    fn test_map_table_preserves_row_order() {
        let rows = vec![
            "Ricavi".to_string(),
            "Totale".to_string(),
            "Costo del Venduto".to_string(),
        ];
        let mapped = map_table(&ontology(), &rows, None);
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0].0, 0);
        assert_eq!(mapped[1].0, 2);
    }
}
