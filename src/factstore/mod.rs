//! The fact store: the dimensional warehouse of extracted and derived
//! financial facts, plus the guardrail and derivation engines that keep it
//! coherent.
//!
//! Writes flow `dedup` → `guardrails` → `derive` → `store`: a batch of
//! candidate facts sharing `(tenant_id, entity_id, period_key, scenario,
//! perimeter)` is first deduplicated down to one authoritative row per
//! metric, then checked against configured guardrail rules, then used to
//! compute any derivable metrics the batch newly makes possible, before the
//! whole batch is persisted.

pub mod dedup;
pub mod derive;
pub mod guardrails;
pub mod schema;
pub mod store;

pub use dedup::elect_authoritative;
pub use derive::{DerivedResult, evaluate_formula, topological_derivation_order, try_derive};
pub use guardrails::{GuardrailConfig, GuardrailSettings, Rule, RuleKind, evaluate as evaluate_guardrails};
pub use store::{FactStore, SqliteFactStore};
