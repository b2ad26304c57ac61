//! The canonical metric ontology: loaded once at startup, held behind an
//! `Arc<RwLock<..>>` so it can be hot-reloaded without a restart.
//!
//! This avoids an ambient mutable singleton:
//! callers receive an `Arc<Ontology>` (or `Arc<RwLock<Ontology>>` if they
//! need reload visibility) from the façade's constructor rather than
//! reaching for a global.

pub mod mapper;

pub use mapper::{MetricMatch, map_label, map_table};

use crate::core::metric::CanonicalMetric;
use crate::error::{OntologyError, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct OntologyFile {
    metrics: Vec<CanonicalMetric>,
}

/// The loaded ontology: canonical metrics indexed by id, with a derived
/// synonym index for fast exact-match lookup.
#[derive(Debug, Clone)]
pub struct Ontology {
    metrics: HashMap<String, CanonicalMetric>,
    synonym_index: HashMap<String, String>,
}

impl Ontology {
    /// Parses an ontology from YAML text and validates it: no duplicate
    /// metric ids, and no cycle in `derivable_from` chains.
    ///
    /// # Errors
    ///
    /// Returns [`OntologyError::Parse`] on malformed YAML,
    /// [`OntologyError::CyclicDerivation`] if a derivation cycle is found.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: OntologyFile =
            serde_yaml::from_str(yaml).map_err(|e| OntologyError::Parse(e.to_string()))?;

        let mut metrics = HashMap::new();
        let mut synonym_index = HashMap::new();
        for metric in file.metrics {
            for synonym in &metric.synonyms {
                synonym_index.insert(normalize_label(synonym), metric.id.clone());
            }
            metrics.insert(metric.id.clone(), metric);
        }

        let ontology = Self {
            metrics,
            synonym_index,
        };
        ontology.check_acyclic()?;
        Ok(ontology)
    }

    /// Loads and validates an ontology from a YAML file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OntologyError::Parse(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml(&contents)
    }

    /// Wraps this ontology in a hot-reloadable handle.
    #[must_use]
    pub fn into_reloadable(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    /// Replaces the contents of `handle` with a freshly loaded ontology
    /// from `path`. Readers in flight continue seeing the old snapshot
    /// until they next acquire the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the new file fails to load or validate; the old
    /// ontology is left in place.
    pub fn reload(handle: &Arc<RwLock<Self>>, path: &Path) -> Result<()> {
        let fresh = Self::load(path)?;
        *handle.write() = fresh;
        Ok(())
    }

    /// Looks up a canonical metric by id.
    #[must_use]
    pub fn metric(&self, id: &str) -> Option<&CanonicalMetric> {
        self.metrics.get(id)
    }

    /// Returns the metric id an exact (post-normalization) synonym match
    /// resolves to, if any.
    #[must_use]
    pub fn exact_synonym_match(&self, normalized_label: &str) -> Option<&str> {
        self.synonym_index.get(normalized_label).map(String::as_str)
    }

    /// Iterates every canonical metric.
    pub fn metrics(&self) -> impl Iterator<Item = &CanonicalMetric> {
        self.metrics.values()
    }

    fn check_acyclic(&self) -> Result<()> {
        let mut state: HashMap<&str, VisitState> = HashMap::new();
        for id in self.metrics.keys() {
            self.visit(id, &mut state)?;
        }
        Ok(())
    }

    fn visit<'a>(&'a self, id: &'a str, state: &mut HashMap<&'a str, VisitState>) -> Result<()> {
        match state.get(id) {
            Some(VisitState::Done) => return Ok(()),
            Some(VisitState::InProgress) => {
                return Err(OntologyError::CyclicDerivation {
                    metric_id: id.to_string(),
                }
                .into());
            }
            None => {}
        }
        state.insert(id, VisitState::InProgress);
        if let Some(metric) = self.metrics.get(id) {
            if let Some(derivable) = &metric.derivable_from {
                for input in &derivable.inputs {
                    if self.metrics.contains_key(input.as_str()) {
                        self.visit(input, state)?;
                    }
                }
            }
        }
        state.insert(id, VisitState::Done);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// Lowercases, strips punctuation, and collapses whitespace — the first
/// step of the label-mapping algorithm, shared by exact and
/// fuzzy matching.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    let stripped: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
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
    synonyms: [Ricavi, Revenue, Vendite]
  - id: ebitda
    display_name: EBITDA
    domain: finance-pl
    unit_kind: currency
    synonyms: [EBITDA, Margine Operativo Lordo]
    derivable_from:
      inputs: [ricavi, costi_operativi]
      formula: ricavi - costi_operativi
  - id: costi_operativi
    display_name: Costi Operativi
    domain: finance-pl
    unit_kind: currency
    synonyms: [Costi Operativi, Operating Costs]
";

    #[test]
    fn test_load_from_yaml() {
        let ontology = Ontology::from_yaml(SAMPLE_YAML).unwrap();
        assert!(ontology.metric("ricavi").is_some());
        assert_eq!(ontology.metrics().count(), 3);
    }

    #[test]
    fn test_exact_synonym_match() {
        let ontology = Ontology::from_yaml(SAMPLE_YAML).unwrap();
        let label = normalize_label("Revenue");
        assert_eq!(ontology.exact_synonym_match(&label), Some("ricavi"));
    }

    #[test]
    fn test_cyclic_derivation_rejected() {
        let yaml = r"
metrics:
  - id: a
    display_name: A
    domain: finance-pl
    unit_kind: currency
    synonyms: [A]
    derivable_from:
      inputs: [b]
      formula: b
  - id: b
    display_name: B
    domain: finance-pl
    unit_kind: currency
    synonyms: [B]
    derivable_from:
      inputs: [a]
      formula: a
";
        let result = Ontology::from_yaml(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_label_strips_punctuation() {
        assert_eq!(normalize_label("Ricavi, netti!"), "ricavi netti");
    }
}
