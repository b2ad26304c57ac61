//! Configuration-driven guardrail rule engine.
//!
//! Rules are read from YAML (mirroring the ontology's `serde_yaml` loading
//! convention) so that adding a coherence or range check never requires a
//! code change to the evaluator — only a new entry in `guardrails.yaml`.

use crate::core::fact::{Fact, QualityFlag, QualityLevel};
use crate::core::metric::UnitKind;
use crate::error::{OntologyError, Result};
use crate::factstore::derive::evaluate_formula;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Global guardrail settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GuardrailSettings {
    /// Relative tolerance applied to coherence checks that don't specify
    /// their own.
    pub default_tolerance: f64,
    /// When true, an `error`-level failure blocks authoritative election
    /// outright rather than merely flagging the fact.
    pub strict_mode: bool,
}

/// The kind-specific parameters of a single rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// `lhs ≈ sum(rhs_sum)` within `tolerance`.
    BalanceSheetCoherence {
        /// Left-hand metric id.
        lhs: String,
        /// Metric ids summed on the right-hand side.
        rhs_sum: Vec<String>,
        /// Relative tolerance, overriding the global default.
        #[serde(default)]
        tolerance: Option<f64>,
    },
    /// A derived metric's stored value must match `formula` evaluated over
    /// its sibling facts in the same batch, within `tolerance`.
    DerivedCoherence {
        /// The metric id this rule checks.
        metric: String,
        /// The formula, evaluated via `factstore::derive::evaluate_formula`
        /// over the batch's metric values.
        formula: String,
        /// Relative tolerance, overriding the global default.
        #[serde(default)]
        tolerance: Option<f64>,
    },
    /// A fact's value must fall within `[min, max]` given its unit kind.
    RangeSanity {
        /// The unit kind this rule applies to.
        unit_kind: UnitKind,
        /// Inclusive lower bound, if any.
        min: Option<f64>,
        /// Inclusive upper bound, if any.
        max: Option<f64>,
    },
    /// A derived fact's inputs must share period and perimeter.
    SamePeriodPerimeter,
}

/// A single configured guardrail rule.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    /// Stable rule id, used as the `QualityFlag::rule_id`.
    pub id: String,
    /// Whether the rule is active.
    pub enabled: bool,
    /// Severity on failure.
    pub level: QualityLevel,
    /// Rule-specific parameters.
    #[serde(flatten)]
    pub kind: RuleKind,
}

/// The full guardrail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardrailConfig {
    /// Global settings.
    pub settings: GuardrailSettings,
    /// Configured rules.
    pub rules: Vec<Rule>,
}

impl GuardrailConfig {
    /// Parses guardrail configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not parse.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| OntologyError::Parse(format!("invalid guardrail config: {e}")).into())
    }

    /// Loads guardrail configuration from a YAML file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OntologyError::Parse(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml(&contents)
    }
}

fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn relative_diff(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() / denom
}

/// Evaluates every applicable rule over `facts`, a group of facts sharing
/// `(tenant_id, entity_id, period_key, scenario, perimeter)`, and returns
/// the flags each fact should receive, keyed by the fact's index in
/// `facts`.
#[must_use]
pub fn evaluate(config: &GuardrailConfig, facts: &[Fact]) -> HashMap<usize, Vec<QualityFlag>> {
    let by_metric: HashMap<&str, (usize, &Fact)> = facts
        .iter()
        .enumerate()
        .map(|(i, f)| (f.metric_id.as_str(), (i, f)))
        .collect();

    let mut flags: HashMap<usize, Vec<QualityFlag>> = HashMap::new();

    for rule in &config.rules {
        if !rule.enabled {
            continue;
        }
        match &rule.kind {
            RuleKind::BalanceSheetCoherence { lhs, rhs_sum, tolerance } => {
                let Some((lhs_idx, lhs_fact)) = by_metric.get(lhs.as_str()).copied() else {
                    continue;
                };
                let Some(lhs_value) = lhs_fact.value else { continue };
                let mut rhs_total = Decimal::ZERO;
                let mut rhs_indices = Vec::new();
                let mut complete = true;
                for metric_id in rhs_sum {
                    match by_metric.get(metric_id.as_str()) {
                        Some((idx, fact)) if fact.value.is_some() => {
                            rhs_total += fact.value.unwrap_or_default();
                            rhs_indices.push(*idx);
                        }
                        _ => {
                            complete = false;
                        }
                    }
                }
                if !complete {
                    continue;
                }
                let tol = tolerance.unwrap_or(config.settings.default_tolerance);
                if relative_diff(decimal_to_f64(lhs_value), decimal_to_f64(rhs_total)) > tol {
                    let flag = QualityFlag {
                        rule_id: rule.id.clone(),
                        level: rule.level,
                        message: format!(
                            "{lhs} ({lhs_value}) does not reconcile with {} ({rhs_total}) within {:.1}%",
                            rhs_sum.join(" + "),
                            tol * 100.0
                        ),
                    };
                    flags.entry(lhs_idx).or_default().push(flag.clone());
                    for idx in rhs_indices {
                        flags.entry(idx).or_default().push(flag.clone());
                    }
                }
            }
            RuleKind::DerivedCoherence { metric, formula, tolerance } => {
                let Some((idx, fact)) = by_metric.get(metric.as_str()).copied() else {
                    continue;
                };
                let Some(stored) = fact.value else { continue };

                let values: HashMap<String, Decimal> = by_metric
                    .iter()
                    .filter_map(|(id, (_, f))| f.value.map(|v| ((*id).to_string(), v)))
                    .collect();
                let Ok(Some(recomputed)) = evaluate_formula(formula, &values) else {
                    // Missing input or division-by-zero: nothing to compare.
                    continue;
                };

                let tol = tolerance.unwrap_or(config.settings.default_tolerance);
                if relative_diff(decimal_to_f64(stored), decimal_to_f64(recomputed)) > tol {
                    flags.entry(idx).or_default().push(QualityFlag {
                        rule_id: rule.id.clone(),
                        level: rule.level,
                        message: format!(
                            "{metric} ({stored}) does not reconcile with {formula} ({recomputed})"
                        ),
                    });
                }
            }
            RuleKind::RangeSanity { unit_kind, min, max } => {
                for (idx, fact) in facts.iter().enumerate() {
                    if fact.unit != unit_kind_str(*unit_kind) {
                        continue;
                    }
                    let Some(value) = fact.value else { continue };
                    let v = decimal_to_f64(value);
                    let out_of_range = min.is_some_and(|m| v < m) || max.is_some_and(|m| v > m);
                    if out_of_range {
                        flags.entry(idx).or_default().push(QualityFlag {
                            rule_id: rule.id.clone(),
                            level: rule.level,
                            message: format!("{} value {v} outside sanity range", fact.metric_id),
                        });
                    }
                }
            }
            RuleKind::SamePeriodPerimeter => {
                for (idx, fact) in facts.iter().enumerate() {
                    let Some(inputs) = &fact.calculated_from else { continue };
                    if inputs.is_empty() {
                        continue;
                    }
                    // Sibling input facts are expected in the same batch;
                    // if an input's period/perimeter marker differs this
                    // rule fires. Inputs carry only a metric id and
                    // source_ref, so the check here is limited to
                    // detecting whether all referenced input metrics are
                    // actually present in this co-derived batch.
                    let all_present = inputs
                        .iter()
                        .all(|input| by_metric.contains_key(input.metric_id.as_str()));
                    if !all_present {
                        flags.entry(idx).or_default().push(QualityFlag {
                            rule_id: rule.id.clone(),
                            level: rule.level,
                            message: format!(
                                "{} was derived from inputs outside this period/perimeter batch",
                                fact.metric_id
                            ),
                        });
                    }
                }
            }
        }
    }

    flags
}

fn unit_kind_str(kind: UnitKind) -> &'static str {
    match kind {
        UnitKind::Currency => "currency",
        UnitKind::Percentage => "percentage",
        UnitKind::Ratio => "ratio",
        UnitKind::Count => "count",
        UnitKind::Days => "days",
        UnitKind::Quantity => "quantity",
    }
}
