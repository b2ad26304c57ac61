//! Canonical metric definitions, loaded from the ontology YAML file.

use serde::{Deserialize, Serialize};

/// The business domain a metric belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    /// Profit & loss.
    FinancePl,
    /// Balance sheet.
    FinanceBs,
    /// Cash flow.
    FinanceCf,
    /// Sales.
    Sales,
    /// Accounts receivable.
    Ar,
    /// Accounts payable.
    Ap,
    /// Inventory.
    Inventory,
    /// Human resources.
    Hr,
    /// Liquidity.
    Liquidity,
}

/// The unit kind a metric's value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    /// A monetary amount.
    Currency,
    /// A percentage (expected range typically `[-100, 100]`).
    Percentage,
    /// A dimensionless ratio.
    Ratio,
    /// A count of discrete items.
    Count,
    /// A number of days.
    Days,
    /// A physical quantity.
    Quantity,
}

/// Sanity bounds for a metric's value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum plausible value.
    pub min: f64,
    /// Maximum plausible value.
    pub max: f64,
}

/// A derivation formula for a metric computed from other metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivableFrom {
    /// The metric ids the formula reads.
    pub inputs: Vec<String>,
    /// The formula text, restricted to `identifier (op identifier|number)*`.
    pub formula: String,
}

/// A stable, curated business concept with a defined unit kind and a set of
/// free-text synonyms used for fuzzy label mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetric {
    /// Stable slug, e.g. `ricavi`, `ebitda`, `pfn`.
    pub id: String,
    /// Human-readable display name.
    pub display_name: String,
    /// The business domain this metric belongs to.
    pub domain: Domain,
    /// The unit kind of this metric's value.
    pub unit_kind: UnitKind,
    /// Ordered synonym list; the first element is the preferred label.
    pub synonyms: Vec<String>,
    /// Optional sanity bounds.
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Optional derivation formula.
    #[serde(default)]
    pub derivable_from: Option<DerivableFrom>,
}

impl CanonicalMetric {
    /// The preferred (first) synonym, falling back to the display name.
    #[must_use]
    pub fn preferred_label(&self) -> &str {
        self.synonyms.first().map_or(self.display_name.as_str(), String::as_str)
    }

    /// Whether a raw value is within this metric's sanity bounds, if any are
    /// defined.
    #[must_use]
    pub fn within_bounds(&self, value: f64) -> bool {
        self.bounds.is_none_or(|b| value >= b.min && value <= b.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CanonicalMetric {
        CanonicalMetric {
            id: "ebitda".to_string(),
            display_name: "EBITDA".to_string(),
            domain: Domain::FinancePl,
            unit_kind: UnitKind::Currency,
            synonyms: vec!["EBITDA".to_string(), "Margine Operativo Lordo".to_string()],
            bounds: None,
            derivable_from: None,
        }
    }

    #[test]
    fn test_preferred_label() {
        assert_eq!(sample().preferred_label(), "EBITDA");
    }

    #[test]
    fn test_within_bounds_unbounded_always_true() {
        assert!(sample().within_bounds(-1_000_000.0));
    }

    #[test]
    fn test_within_bounds_respects_range() {
        let mut m = sample();
        m.bounds = Some(Bounds {
            min: -100.0,
            max: 100.0,
        });
        assert!(m.within_bounds(50.0));
        assert!(!m.within_bounds(150.0));
    }
}
