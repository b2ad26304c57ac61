//! The query orchestrator: the six-stage pipeline (Classify, Retrieve,
//! Extract, Validate, Persist, Compose) behind `answer`.
//!
//! Mirrors the teacher's `search::hybrid_search` composition style — one
//! function that strings together independently testable stages — scaled
//! up to a pipeline that also touches the fact store and the ontology.
//! Unlike the teacher's single-user REPL, every stage here is scoped by a
//! [`UserContext`] and observes a [`concurrency::CancellationToken`]
//! between steps.

pub mod concurrency;

use crate::access::UserContext;
use crate::core::fact::{Fact, Perimeter, QualityLevel, Scenario};
use crate::core::metric::UnitKind;
use crate::core::period::{FiscalCalendar, PeriodKey};
use crate::error::Result;
use crate::factstore::guardrails::{GuardrailConfig, evaluate as evaluate_guardrails};
use crate::factstore::store::{FactQuery, FactStore};
use crate::ingest::candidates::pair_narrative_text;
use crate::ingest::now_unix;
use crate::normalize::number::{LocaleHint, ScaleHint, normalize as normalize_number};
use crate::normalize::period::normalize_period;
use crate::ontology::{MetricMatch, Ontology, map_label};
use crate::orchestrator::concurrency::{CancellationToken, QueryAdmission};
use crate::retrieval::{HybridRetriever, RetrievalFilters, ScoredChunk};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

/// The kind of question asked, decided by the Classify stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionIntent {
    /// A single metric/period lookup ("What is the EBITDA in 2023?").
    MetricLookup,
    /// A comparison across periods, entities, or scenarios.
    Comparison,
    /// A free-text question with no obvious metric anchor.
    Narrative,
    /// Anchors on a metric but asks for explanation rather than a bare
    /// value, so it runs both the extraction and narrative paths.
    Hybrid,
}

/// Decides a question's [`QuestionIntent`]. Kept as a trait so a future
/// LLM-backed classifier can replace [`RuleBasedClassifier`] without
/// touching the orchestrator.
pub trait QuestionClassifier: Send + Sync {
    /// Classifies `question`.
    fn classify(&self, question: &str) -> QuestionIntent;
}

const NARRATIVE_MARKERS: &[&str] =
    &["why", "how", "explain", "perché", "perche", "come mai", "cosa significa", "what does"];
const COMPARISON_MARKERS: &[&str] =
    &["vs", "versus", "compared", "change", "growth", "rispetto a", "variazione", "delta"];

/// Rule-based classifier: looks for narrative/comparison marker words
/// rather than calling an LLM. Good enough to route the pipeline; a bad
/// classification degrades the answer (an extra retrieval pass, a missed
/// citation) but never fails it outright.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier;

impl QuestionClassifier for RuleBasedClassifier {
    fn classify(&self, question: &str) -> QuestionIntent {
        let lower = question.to_lowercase();
        let narrative = NARRATIVE_MARKERS.iter().any(|m| lower.contains(m));
        let comparison = COMPARISON_MARKERS.iter().any(|m| lower.contains(m));
        match (narrative, comparison) {
            (true, true) => QuestionIntent::Hybrid,
            (true, false) => QuestionIntent::Narrative,
            (false, true) => QuestionIntent::Comparison,
            (false, false) => QuestionIntent::MetricLookup,
        }
    }
}

/// Tuning knobs for one `answer` call.
#[derive(Debug, Clone)]
pub struct AnswerOptions {
    /// How many chunks to retrieve.
    pub top_k: usize,
    /// Whether newly extracted facts should be persisted (stage 5).
    pub persist_extracted_facts: bool,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self { top_k: 8, persist_extracted_facts: true }
    }
}

/// A single numeric claim backing the composed answer, citing its
/// `source_ref` in canonical string form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// Canonical metric id.
    pub metric_id: String,
    /// The cited value, or `None` when the underlying fact was masked.
    pub value: Option<rust_decimal::Decimal>,
    /// Canonical period string, e.g. `"FY/2024"`.
    pub period: String,
    /// Canonical provenance string.
    pub source_ref: String,
    /// Whether the cited fact was masked by row-level access control.
    pub masked: bool,
}

/// Diagnostics about how an `answer` call resolved, surfaced so a degraded
/// answer (fallback extraction, no cross-encoder) is never silently
/// indistinguishable from a fully-resolved one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    /// The classified intent.
    pub intent: Option<QuestionIntent>,
    /// Chunks the retrieval stage returned.
    pub chunks_retrieved: usize,
    /// Facts newly extracted from chunks (not found directly in the store).
    pub facts_extracted: usize,
    /// Facts successfully persisted in stage 5.
    pub facts_persisted: usize,
    /// Which retrieval strategy actually ran.
    pub retrieval_strategy: Option<String>,
    /// Wall-clock time for the whole call, in milliseconds.
    pub elapsed_ms: u64,
}

impl Default for QuestionIntent {
    fn default() -> Self {
        Self::Narrative
    }
}

/// The result of an `answer` call.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The composed, citation-bearing text.
    pub text: String,
    /// Every numeric claim made in `text`, with provenance.
    pub citations: Vec<Citation>,
    /// The underlying facts (direct hits plus newly extracted ones).
    pub metrics: Vec<Fact>,
    /// Guardrail or degraded-retrieval warnings surfaced by this call.
    pub warnings: Vec<String>,
    /// Diagnostics about how the answer was produced.
    pub processing_stats: ProcessingStats,
}

/// Composes retrieval, extraction, validation, persistence, and answer
/// text generation into a single `answer` entry point.
///
/// Holds no global lock: the fact store is behind a `Mutex` because
/// `FactStore`'s write methods take `&mut self`, but every read/write is
/// scoped to the duration of one stage, never held across a suspension
/// point, per the "a query handler holds no global locks" resource model.
pub struct Orchestrator {
    retriever: Arc<HybridRetriever>,
    fact_store: Arc<Mutex<Box<dyn FactStore>>>,
    ontology: Arc<RwLock<Ontology>>,
    guardrails: GuardrailConfig,
    fiscal_calendar: FiscalCalendar,
    classifier: Arc<dyn QuestionClassifier>,
    admission: QueryAdmission,
}

impl Orchestrator {
    /// Builds an orchestrator from its component services.
    #[must_use]
    pub fn new(
        retriever: Arc<HybridRetriever>,
        fact_store: Arc<Mutex<Box<dyn FactStore>>>,
        ontology: Arc<RwLock<Ontology>>,
        guardrails: GuardrailConfig,
        fiscal_calendar: FiscalCalendar,
        max_concurrent_queries: usize,
    ) -> Self {
        Self {
            retriever,
            fact_store,
            ontology,
            guardrails,
            fiscal_calendar,
            classifier: Arc::new(RuleBasedClassifier),
            admission: QueryAdmission::new(max_concurrent_queries),
        }
    }

    /// Overrides the default rule-based classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn QuestionClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Answers `question` on behalf of `user_ctx`.
    ///
    /// Runs Classify, Retrieve, Extract, Validate, Persist, and Compose in
    /// order, checking `cancellation` between each. Stage 5 (Persist) is
    /// best-effort: a write failure is logged and surfaced as a warning,
    /// never as an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::OrchestratorError::Overloaded`] if
    /// `max_concurrent_queries` callers are already in flight,
    /// [`crate::error::OrchestratorError::Cancelled`] if `cancellation` is
    /// observed cancelled between stages, or an error if retrieval or the
    /// direct fact-store lookup itself fails outright.
    pub fn answer(
        &self,
        question: &str,
        user_ctx: &UserContext,
        options: &AnswerOptions,
        cancellation: &CancellationToken,
    ) -> Result<Answer> {
        let started = Instant::now();
        let _permit = self.admission.try_admit()?;
        cancellation.check()?;

        // 1. Classify.
        let intent = self.classifier.classify(question);
        cancellation.check()?;

        // 2. Retrieve.
        let (metric_match, period_key) = {
            let ontology = self.ontology.read();
            (infer_metric(&ontology, question), infer_period(question, &self.fiscal_calendar))
        };
        let filters = RetrievalFilters {
            document_id: None,
            period: period_key.as_ref().map(ToString::to_string),
            metric_id: metric_match.as_ref().map(|m| m.metric_id.clone()),
        };
        let retrieved = self.retriever.retrieve(question, user_ctx, options.top_k, &filters)?;
        cancellation.check()?;

        // 3. Extract.
        let attempts_lookup =
            matches!(intent, QuestionIntent::MetricLookup | QuestionIntent::Comparison | QuestionIntent::Hybrid);

        let mut direct_facts = Vec::new();
        let mut newly_extracted = Vec::new();
        if attempts_lookup {
            if let Some(metric_match) = &metric_match {
                let query = FactQuery {
                    metric_ids: Some(vec![metric_match.metric_id.clone()]),
                    period_prefix: period_key.as_ref().map(ToString::to_string),
                    authoritative_only: true,
                    ..FactQuery::default()
                };
                direct_facts = self.fact_store.lock().query_facts(user_ctx, &query)?;

                if direct_facts.is_empty() {
                    newly_extracted =
                        self.extract_from_chunks(&retrieved, &metric_match.metric_id, period_key.as_ref(), user_ctx);
                }
            }
        }
        cancellation.check()?;

        // 4. Validate.
        let flags = evaluate_guardrails(&self.guardrails, &newly_extracted);
        for (index, fact_flags) in flags {
            if let Some(fact) = newly_extracted.get_mut(index) {
                fact.quality_flags.extend(fact_flags);
            }
        }
        let mut warnings: Vec<String> = newly_extracted
            .iter()
            .flat_map(|fact| fact.quality_flags.iter())
            .filter(|flag| flag.level != QualityLevel::Info)
            .map(|flag| flag.message.clone())
            .collect();
        cancellation.check()?;

        // 5. Persist (best-effort).
        let facts_extracted = newly_extracted.len();
        let mut facts_persisted = 0usize;
        if options.persist_extracted_facts {
            for fact in &mut newly_extracted {
                fact.authoritative = !(self.guardrails.settings.strict_mode && fact.has_blocking_flag());
                match self.fact_store.lock().upsert_fact(fact) {
                    Ok(id) => {
                        fact.id = Some(id);
                        facts_persisted += 1;
                    }
                    Err(err) => {
                        warn!(metric_id = %fact.metric_id, error = %err, "failed to persist extracted fact");
                        warnings.push(format!("could not persist {}: {err}", fact.metric_id));
                    }
                }
            }
        }
        cancellation.check()?;

        // 6. Compose.
        let mut all_facts = direct_facts;
        all_facts.extend(newly_extracted);
        let text = compose_text(question, intent, &all_facts, retrieved.len());
        let citations = all_facts
            .iter()
            .map(|fact| Citation {
                metric_id: fact.metric_id.clone(),
                value: fact.value,
                period: fact.period_key.to_string(),
                source_ref: fact.source_ref.to_string(),
                masked: fact.masked,
            })
            .collect();

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(Answer {
            text,
            citations,
            metrics: all_facts,
            warnings,
            processing_stats: ProcessingStats {
                intent: Some(intent),
                chunks_retrieved: retrieved.len(),
                facts_extracted,
                facts_persisted,
                retrieval_strategy: retrieved.first().map(|chunk| format!("{:?}", chunk.strategy)),
                elapsed_ms,
            },
        })
    }

    /// Scans retrieved chunks for `(label, value)` pairs whose label maps to
    /// `metric_id`, normalizes the value, and builds unpersisted candidate
    /// [`Fact`]s. Uses the same `pair_narrative_text` + `map_label` +
    /// `normalize_number` chain the ingest pipeline uses on first extraction,
    /// so a metric missed during ingest can still be answered on demand.
    fn extract_from_chunks(
        &self,
        chunks: &[ScoredChunk],
        metric_id: &str,
        period_key: Option<&PeriodKey>,
        user_ctx: &UserContext,
    ) -> Vec<Fact> {
        let Some(period) = period_key else { return Vec::new() };
        let ontology = self.ontology.read();
        let Some(metric) = ontology.metric(metric_id) else { return Vec::new() };
        let unit = unit_kind_str(metric.unit_kind).to_string();

        let mut extracted = Vec::new();
        for scored in chunks {
            let chunk = &scored.chunk;
            for candidate in pair_narrative_text(&chunk.text, &chunk.source_ref) {
                let Some(matched) = map_label(&ontology, &candidate.label, Some(metric.domain)) else {
                    continue;
                };
                if matched.metric_id != metric_id {
                    continue;
                }
                let Ok(normalized) =
                    normalize_number(&candidate.raw_value, LocaleHint::Unknown, ScaleHint::Units, None)
                else {
                    continue;
                };

                extracted.push(Fact {
                    id: None,
                    tenant_id: user_ctx.tenant_id.clone(),
                    entity_id: chunk.document_id.clone(),
                    metric_id: metric_id.to_string(),
                    value: Some(normalized.value),
                    unit: unit.clone(),
                    currency: normalized.currency.clone(),
                    period_key: period.clone(),
                    scenario: Scenario::Actual,
                    perimeter: Perimeter::Unspecified,
                    dimensions: std::collections::BTreeMap::new(),
                    source_ref: candidate.source_ref.clone(),
                    calculated_from: None,
                    formula: None,
                    quality_flags: Vec::new(),
                    classification_level: chunk.classification_level,
                    created_at: now_unix(),
                    authoritative: false,
                    masked: false,
                });
            }
        }
        extracted
    }
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

fn period_scan_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)FY\s*\d{4}|Q[1-4]\s*\d{4}|YTD\s+\w+\s+\d{4}|\d{1,2}/\d{4}|\b\d{4}\b")
            .expect("valid regex")
    })
}

/// Scans free text for the first substring that matches a known period
/// grammar and resolves it via `normalize_period`. `normalize_period`
/// itself requires an exact whole-string match, so this does the
/// substring-finding a question's surrounding words would otherwise block.
fn infer_period(question: &str, fiscal_calendar: &FiscalCalendar) -> Option<PeriodKey> {
    period_scan_regex()
        .find_iter(question)
        .find_map(|candidate| normalize_period(candidate.as_str(), fiscal_calendar).ok())
}

/// Scans free text for the highest-confidence metric label match, trying
/// word, bigram, and trigram windows since a metric synonym may be
/// multi-word ("Costo del Venduto").
fn infer_metric(ontology: &Ontology, question: &str) -> Option<MetricMatch> {
    let words: Vec<&str> = question.split_whitespace().collect();
    let mut best: Option<MetricMatch> = None;
    for window in 1..=3usize.min(words.len().max(1)) {
        if window > words.len() {
            break;
        }
        for span in words.windows(window) {
            let candidate = span.join(" ");
            if let Some(matched) = map_label(ontology, &candidate, None) {
                if best.as_ref().is_none_or(|current| matched.confidence > current.confidence) {
                    best = Some(matched);
                }
            }
        }
    }
    best
}

fn compose_text(question: &str, intent: QuestionIntent, facts: &[Fact], chunks_retrieved: usize) -> String {
    if facts.is_empty() {
        return if chunks_retrieved == 0 {
            format!("No indexed content was found to answer \"{question}\".")
        } else {
            format!(
                "No authoritative figure could be extracted to answer \"{question}\"; {chunks_retrieved} related passage(s) were retrieved but none yielded a confident metric match."
            )
        };
    }

    let mut lines = Vec::with_capacity(facts.len());
    for fact in facts {
        let value_text = fact.value.map_or_else(|| "[masked]".to_string(), |v| v.to_string());
        lines.push(format!(
            "{} for {} was {} {} (source: {}).",
            fact.metric_id, fact.period_key, value_text, fact.unit, fact.source_ref
        ));
    }
    if matches!(intent, QuestionIntent::Narrative | QuestionIntent::Hybrid) {
        lines.push(format!("({chunks_retrieved} supporting passage(s) retrieved.)"));
    }
    lines.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Role, UserContext};
    use crate::core::chunk::{Chunk, ChunkKind};
    use crate::core::fact::ClassificationLevel;
    use crate::core::source_ref::{SourceReference, SourceType};
    use crate::embedding::FallbackEmbedder;
    use crate::factstore::store::SqliteFactStore;
    use crate::retrieval::index::ChunkIndex;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    const ONTOLOGY_YAML: &str = include_str!("../../ontology.yaml");
    const GUARDRAILS_YAML: &str = include_str!("../../guardrails.yaml");

    fn ontology() -> Arc<RwLock<Ontology>> {
        Ontology::from_yaml(ONTOLOGY_YAML).unwrap().into_reloadable()
    }

    fn guardrails() -> GuardrailConfig {
        GuardrailConfig::from_yaml(GUARDRAILS_YAML).unwrap()
    }

    fn fact_store() -> Arc<Mutex<Box<dyn FactStore>>> {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut store = SqliteFactStore::new(conn);
        store.init().unwrap();
        Arc::new(Mutex::new(Box::new(store)))
    }

    fn retriever_with_chunk(chunk: Chunk) -> Arc<HybridRetriever> {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut index = ChunkIndex::new(conn);
        index.init().unwrap();
        index.upsert_chunk(&chunk).unwrap();
        let embedder: Arc<dyn crate::embedding::Embedder> = Arc::new(FallbackEmbedder::new(crate::embedding::DEFAULT_DIMENSIONS));
        Arc::new(HybridRetriever::new(Arc::new(index), embedder, crate::config::RetrievalConfig::default()))
    }

    fn ctx(ceiling: ClassificationLevel) -> UserContext {
        UserContext {
            user_id: "u1".to_string(),
            username: "mario".to_string(),
            tenant_id: "acme".to_string(),
            role: Role::Analyst,
            accessible_entities: BTreeSet::new(),
            accessible_periods: BTreeSet::new(),
            max_classification_level: ceiling,
            session_id: "s1".to_string(),
            session_expires_at: 9_999_999_999,
        }
    }

    #[test]
    fn test_classifier_detects_metric_lookup() {
        assert_eq!(RuleBasedClassifier.classify("What is the EBITDA in 2023?"), QuestionIntent::MetricLookup);
    }

    #[test]
    fn test_classifier_detects_narrative() {
        assert_eq!(
            RuleBasedClassifier.classify("Why did EBITDA margin decline?"),
            QuestionIntent::Narrative
        );
    }

    #[test]
    fn test_classifier_detects_comparison() {
        assert_eq!(
            RuleBasedClassifier.classify("Revenue growth vs last year"),
            QuestionIntent::Comparison
        );
    }

    #[test]
    fn test_classifier_detects_hybrid() {
        assert_eq!(
            RuleBasedClassifier.classify("Explain the change in revenue vs 2023"),
            QuestionIntent::Hybrid
        );
    }

    #[test]
    fn test_infer_period_recognizes_fy() {
        let key = infer_period("What is the EBITDA in FY 2023?", &FiscalCalendar::default()).unwrap();
        assert_eq!(key.year, 2023);
    }

    #[test]
    fn test_infer_period_recognizes_bare_year() {
        let key = infer_period("What is revenue for 2024", &FiscalCalendar::default()).unwrap();
        assert_eq!(key.year, 2024);
    }

    #[test]
    fn test_infer_metric_matches_multiword_synonym() {
        let ontology_handle = ontology();
        let ontology_guard = ontology_handle.read();
        let matched = infer_metric(&ontology_guard, "What was the Cost of Goods Sold last year?").unwrap();
        assert_eq!(matched.metric_id, "costo_del_venduto");
    }

    fn narrative_chunk(text: &str) -> Chunk {
        let source_ref = SourceReference::narrative("report.pdf", "hash1", SourceType::PdfNative, Some(3), "pdf-extract", 0, 0.9);
        Chunk::new("doc-1", source_ref, ChunkKind::Narrative, text.to_string(), "acme", ClassificationLevel::Internal)
    }

    #[test]
    fn test_answer_extracts_from_chunk_when_store_is_empty() {
        let chunk = narrative_chunk("Ricavi: 1.234.567,89 € in FY 2024.");
        let orchestrator = Orchestrator::new(
            retriever_with_chunk(chunk),
            fact_store(),
            ontology(),
            guardrails(),
            FiscalCalendar::default(),
            4,
        );
        let answer = orchestrator
            .answer(
                "What is Ricavi for FY 2024?",
                &ctx(ClassificationLevel::Internal),
                &AnswerOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(answer.processing_stats.facts_extracted, 1);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].metric_id, "ricavi");
        assert!(answer.text.contains("ricavi"));
    }

    #[test]
    fn test_answer_prefers_direct_store_hit_over_extraction() {
        let store = fact_store();
        let period = PeriodKey::fy(2024, chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        {
            let mut guard = store.lock();
            guard
                .upsert_fact(&Fact {
                    id: None,
                    tenant_id: "acme".to_string(),
                    entity_id: "acme-spa".to_string(),
                    metric_id: "ricavi".to_string(),
                    value: Some(Decimal::from(5_000_000)),
                    unit: "currency".to_string(),
                    currency: Some("EUR".to_string()),
                    period_key: period,
                    scenario: Scenario::Actual,
                    perimeter: Perimeter::Statutory,
                    dimensions: std::collections::BTreeMap::new(),
                    source_ref: SourceReference::narrative("report.pdf", "hash1", SourceType::PdfNative, Some(3), "pdf-extract", 0, 0.95),
                    calculated_from: None,
                    formula: None,
                    quality_flags: Vec::new(),
                    classification_level: ClassificationLevel::Internal,
                    created_at: 1,
                    authoritative: true,
                    masked: false,
                })
                .unwrap();
        }

        let chunk = narrative_chunk("Nothing relevant here.");
        let orchestrator =
            Orchestrator::new(retriever_with_chunk(chunk), store, ontology(), guardrails(), FiscalCalendar::default(), 4);
        let answer = orchestrator
            .answer(
                "What is Ricavi for FY 2024?",
                &ctx(ClassificationLevel::Internal),
                &AnswerOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(answer.processing_stats.facts_extracted, 0);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].value, Some(Decimal::from(5_000_000)));
    }

    #[test]
    fn test_answer_overloaded_when_admission_exhausted() {
        let chunk = narrative_chunk("Ricavi: 1.000 € in FY 2024.");
        let orchestrator =
            Orchestrator::new(retriever_with_chunk(chunk), fact_store(), ontology(), guardrails(), FiscalCalendar::default(), 1);
        let permit = orchestrator.admission.try_admit().unwrap();
        let result = orchestrator.answer(
            "What is Ricavi for FY 2024?",
            &ctx(ClassificationLevel::Internal),
            &AnswerOptions::default(),
            &CancellationToken::new(),
        );
        assert!(result.is_err());
        drop(permit);
    }

    #[test]
    fn test_answer_observes_cancellation() {
        let chunk = narrative_chunk("Ricavi: 1.000 € in FY 2024.");
        let orchestrator =
            Orchestrator::new(retriever_with_chunk(chunk), fact_store(), ontology(), guardrails(), FiscalCalendar::default(), 4);
        let token = CancellationToken::new();
        token.cancel();
        let result = orchestrator.answer(
            "What is Ricavi for FY 2024?",
            &ctx(ClassificationLevel::Internal),
            &AnswerOptions::default(),
            &token,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_answer_returns_no_citations_when_nothing_found() {
        let chunk = narrative_chunk("Nothing about any metric here.");
        let orchestrator =
            Orchestrator::new(retriever_with_chunk(chunk), fact_store(), ontology(), guardrails(), FiscalCalendar::default(), 4);
        let answer = orchestrator
            .answer(
                "What is Ricavi for FY 2024?",
                &ctx(ClassificationLevel::Internal),
                &AnswerOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(answer.citations.is_empty());
        assert!(answer.text.contains("No authoritative figure"));
    }
}
