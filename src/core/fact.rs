//! The central [`Fact`] entity and its supporting enums.

use crate::core::period::PeriodKey;
use crate::core::source_ref::SourceReference;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Whether a fact represents actual results, a budget, or a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Realized results.
    Actual,
    /// Budgeted figure.
    Budget,
    /// Forecasted figure.
    Forecast,
    /// Scenario not determined.
    Unspecified,
}

/// The reporting scope of a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Perimeter {
    /// Statutory (single-entity, local GAAP) figures.
    Statutory,
    /// Consolidated group figures.
    Consolidated,
    /// Internal management-reporting figures.
    Management,
    /// Perimeter not determined.
    Unspecified,
}

/// A per-row-level classification tier, gating read access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationLevel {
    /// Visible to anyone.
    Public,
    /// Visible within the tenant.
    Internal,
    /// Visible to a restricted set of roles.
    Confidential,
    /// Visible only to the most privileged roles.
    Restricted,
}

impl ClassificationLevel {
    /// Lowercase wire form used in storage and query filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Confidential => "confidential",
            Self::Restricted => "restricted",
        }
    }

    /// Parses the lowercase wire form, defaulting to `Public` for anything
    /// unrecognized rather than failing a read.
    #[must_use]
    pub fn from_str_or_public(s: &str) -> Self {
        match s {
            "internal" => Self::Internal,
            "confidential" => Self::Confidential,
            "restricted" => Self::Restricted,
            _ => Self::Public,
        }
    }

    /// Every classification level at or below `self`, ascending. Used to
    /// build an `IN (...)` filter scoped to a caller's classification
    /// ceiling.
    #[must_use]
    pub const fn at_or_below(self) -> &'static [Self] {
        match self {
            Self::Public => &[Self::Public],
            Self::Internal => &[Self::Public, Self::Internal],
            Self::Confidential => &[Self::Public, Self::Internal, Self::Confidential],
            Self::Restricted => &[Self::Public, Self::Internal, Self::Confidential, Self::Restricted],
        }
    }
}

/// The outcome of a single guardrail rule evaluation, attached to a fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityFlag {
    /// The rule that produced this flag.
    pub rule_id: String,
    /// Severity of the flag.
    pub level: QualityLevel,
    /// Human-readable explanation.
    pub message: String,
}

/// Severity of a quality flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    /// Blocks derivation / authoritative election.
    Error,
    /// Flag only, does not block.
    Warning,
    /// Informational.
    Info,
}

/// A derivation input: the metric it came from and its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationInput {
    /// The input metric's id.
    pub metric_id: String,
    /// The input's own provenance.
    pub source_ref: SourceReference,
}

/// A single measured value for a metric, period, scenario, and perimeter,
/// with full provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Surrogate id assigned by the store (`None` before first persist).
    pub id: Option<i64>,
    /// Owning tenant.
    pub tenant_id: String,
    /// Organizational unit the fact pertains to.
    pub entity_id: String,
    /// Canonical metric id.
    pub metric_id: String,
    /// The measured value. `None` when a derivation was undefined (e.g.
    /// division by zero) or when a row is returned masked.
    pub value: Option<Decimal>,
    /// Unit string (mirrors the metric's `unit_kind` at write time).
    pub unit: String,
    /// ISO currency code, when `unit_kind` is `currency`.
    pub currency: Option<String>,
    /// The canonical period.
    pub period_key: PeriodKey,
    /// Actual / budget / forecast.
    pub scenario: Scenario,
    /// Statutory / consolidated / management.
    pub perimeter: Perimeter,
    /// Sparse dimension map (product, region, channel, …). A `BTreeMap` so
    /// the dedup-key hash below is deterministic across process runs.
    pub dimensions: BTreeMap<String, String>,
    /// Provenance.
    pub source_ref: SourceReference,
    /// Inputs this fact was derived from, if it is a calculated fact.
    pub calculated_from: Option<Vec<DerivationInput>>,
    /// Readable formula expression, if calculated.
    pub formula: Option<String>,
    /// Guardrail outcomes attached to this fact.
    pub quality_flags: Vec<QualityFlag>,
    /// Row classification level.
    pub classification_level: ClassificationLevel,
    /// When this row was created, as a Unix timestamp.
    pub created_at: i64,
    /// Whether this row is the elected authoritative fact for its dedup key.
    pub authoritative: bool,
    /// Set when a row is returned to a caller whose classification ceiling
    /// is below `classification_level` and the role's policy is `mask`.
    #[serde(default)]
    pub masked: bool,
}

impl Fact {
    /// Computes the logical dedup key used for authoritative-fact election:
    /// `(tenant_id, entity_id, metric_id, period_key, scenario, perimeter,
    /// dimensions_hash)`.
    #[must_use]
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            tenant_id: self.tenant_id.clone(),
            entity_id: self.entity_id.clone(),
            metric_id: self.metric_id.clone(),
            period_key: format!("{}", self.period_key),
            scenario: self.scenario,
            perimeter: self.perimeter,
            dimensions_hash: hash_dimensions(&self.dimensions),
        }
    }

    /// Returns `true` if any attached quality flag is of `Error` severity.
    #[must_use]
    pub fn has_blocking_flag(&self) -> bool {
        self.quality_flags.iter().any(|f| f.level == QualityLevel::Error)
    }
}

/// The logical identity of a fact for dedup/election purposes. Two facts
/// with the same `DedupKey` are competing revisions of the same datum;
/// exactly one is elected authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    /// Owning tenant.
    pub tenant_id: String,
    /// Organizational unit.
    pub entity_id: String,
    /// Canonical metric id.
    pub metric_id: String,
    /// Canonical string form of the period key.
    pub period_key: String,
    /// Actual / budget / forecast.
    pub scenario: Scenario,
    /// Statutory / consolidated / management.
    pub perimeter: Perimeter,
    /// Stable hash of the dimensions map.
    pub dimensions_hash: u64,
}

/// Hashes a dimensions map deterministically by iterating its `BTreeMap`
/// (already key-sorted) rather than a `HashMap`, whose iteration order is
/// randomized per process.
#[must_use]
pub fn hash_dimensions(dimensions: &BTreeMap<String, String>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (k, v) in dimensions {
        k.hash(&mut hasher);
        v.hash(&mut hasher);
    }
    hasher.finish()
}
