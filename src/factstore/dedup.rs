//! Authoritative-fact election.
//!
//! When the same `(tenant_id, entity_id, metric_id, period_key, scenario,
//! perimeter, dimensions)` tuple is extracted more than once — e.g. a
//! figure restated in both the PDF narrative and the appendix table — the
//! store keeps every candidate row for audit but elects exactly one as
//! authoritative for query answers. Election weighs four criteria:
//! recency 0.4, specificity 0.3, source quality 0.2, confidence 0.1.

use crate::core::fact::Fact;

/// Scores and ranks `candidates`, which must all share the same dedup key,
/// returning the index of the elected authoritative fact.
///
/// Ties (identical scores) are broken deterministically by comparing each
/// candidate's `source_ref` canonical string form; the lexicographically
/// greatest wins, so the outcome does not depend on input order.
///
/// # Panics
///
/// Panics if `candidates` is empty; callers are expected to only invoke
/// this on a non-empty dedup group.
#[must_use]
pub fn elect_authoritative(candidates: &[Fact]) -> usize {
    assert!(!candidates.is_empty(), "elect_authoritative requires at least one candidate");

    if candidates.len() == 1 {
        return 0;
    }

    let oldest = candidates.iter().map(|f| f.created_at).min().unwrap_or(0);
    let newest = candidates.iter().map(|f| f.created_at).max().unwrap_or(0);
    let span = (newest - oldest).max(1) as f64;

    let mut best_index = 0;
    let mut best_score = f64::MIN;

    for (index, fact) in candidates.iter().enumerate() {
        let recency = (fact.created_at - oldest) as f64 / span;
        let specificity = f64::from(fact.source_ref.specificity_rank()) / 3.0;
        let quality = f64::from(fact.source_ref.quality_rank()) / 4.0;
        let confidence = f64::from(fact.source_ref.confidence);

        let score = 0.4 * recency + 0.3 * specificity + 0.2 * quality + 0.1 * confidence;

        let better = match score.partial_cmp(&best_score) {
            Some(std::cmp::Ordering::Greater) => true,
            Some(std::cmp::Ordering::Equal) => {
                fact.source_ref.tie_break_key() > candidates[best_index].source_ref.tie_break_key()
            }
            _ => false,
        };
        if better {
            best_score = score;
            best_index = index;
        }
    }

    best_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fact::{ClassificationLevel, Perimeter, Scenario};
    use crate::core::period::PeriodKey;
    use crate::core::source_ref::{SourceReference, SourceType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn period() -> PeriodKey {
        PeriodKey::fy(
            2024,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    fn base_fact(source_ref: SourceReference, created_at: i64) -> Fact {
        Fact {
            id: None,
            tenant_id: "acme".to_string(),
            entity_id: "acme-spa".to_string(),
            metric_id: "ricavi".to_string(),
            value: Some(Decimal::from(1000)),
            unit: "currency".to_string(),
            currency: Some("EUR".to_string()),
            period_key: period(),
            scenario: Scenario::Actual,
            perimeter: Perimeter::Statutory,
            dimensions: Default::default(),
            source_ref,
            calculated_from: None,
            formula: None,
            quality_flags: Vec::new(),
            classification_level: ClassificationLevel::Internal,
            created_at,
            authoritative: false,
            masked: false,
        }
    }

    #[test]
    fn test_single_candidate_wins_trivially() {
        let sref = SourceReference::narrative("f", "h", SourceType::PdfNative, Some(1), "m", 0, 1.0);
        let candidates = vec![base_fact(sref, 100)];
        assert_eq!(elect_authoritative(&candidates), 0);
    }

    #[test]
    fn test_more_recent_wins_when_other_factors_equal() {
        let sref_a = SourceReference::narrative("f", "h", SourceType::PdfNative, Some(1), "m", 0, 0.9);
        let sref_b = SourceReference::narrative("f", "h", SourceType::PdfNative, Some(2), "m", 0, 0.9);
        let candidates = vec![base_fact(sref_a, 100), base_fact(sref_b, 200)];
        assert_eq!(elect_authoritative(&candidates), 1);
    }

    #[test]
    fn test_cell_level_specificity_beats_narrative() {
        let cell = SourceReference::spreadsheet_cell("f", "h", "CE", "B12", "calamine", 0, 0.8);
        let narrative = SourceReference::narrative("f", "h", SourceType::PdfNative, Some(1), "m", 0, 0.95);
        let candidates = vec![base_fact(narrative, 100), base_fact(cell, 100)];
        assert_eq!(elect_authoritative(&candidates), 1);
    }

    #[test]
    fn test_election_is_order_independent() {
        let sref_a = SourceReference::narrative("f", "h", SourceType::PdfNative, Some(1), "m", 0, 0.9);
        let sref_b = SourceReference::narrative("f", "h", SourceType::PdfNative, Some(2), "m", 0, 0.9);
        let forward = vec![base_fact(sref_a.clone(), 100), base_fact(sref_b.clone(), 200)];
        let backward = vec![base_fact(sref_b, 200), base_fact(sref_a, 100)];
        let forward_winner = &forward[elect_authoritative(&forward)];
        let backward_winner = &backward[elect_authoritative(&backward)];
        assert_eq!(forward_winner.created_at, backward_winner.created_at);
    }
}
