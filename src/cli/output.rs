//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::document::Document;
use crate::core::fact::Fact;
use crate::engine::EngineStatus;
use crate::orchestrator::Answer;
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
    /// Newline-delimited JSON (NDJSON) for streaming.
    /// Each record is a single JSON object on its own line.
    Ndjson,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" | "stream" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Returns true if this format is a streaming format.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Ndjson)
    }
}

/// Formats a status response.
#[must_use]
pub fn format_status(status: &EngineStatus, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(status),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(status),
    }
}

fn format_status_text(status: &EngineStatus) -> String {
    let mut output = String::new();
    output.push_str("fincore status\n");
    output.push_str("==============\n\n");
    let _ = writeln!(output, "  Chunks indexed: {}", status.chunk_count);
    let _ = writeln!(output, "  Facts visible:  {}", status.fact_count);
    output
}

/// Formats the result of an `ingest` command.
#[must_use]
pub fn format_document(document: &Document, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_document_text(document),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(document),
    }
}

fn format_document_text(document: &Document) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Document:      {}", document.document_id);
    let _ = writeln!(output, "File:          {}", document.file_name);
    let _ = writeln!(output, "Status:        {}", document.status);
    if let Some(error) = &document.error {
        let _ = writeln!(output, "Error:         {error}");
    }
    output
}

/// Formats an `answer` response.
#[must_use]
pub fn format_answer(answer: &Answer, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_answer_text(answer),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(answer),
    }
}

fn format_answer_text(answer: &Answer) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}\n", answer.text);

    if !answer.citations.is_empty() {
        output.push_str("Citations:\n");
        for citation in &answer.citations {
            let masked = if citation.masked { " (masked)" } else { "" };
            let value = citation.value.map_or_else(|| "—".to_string(), |v| v.to_string());
            let _ = writeln!(output, "  - {} = {} [{}]{masked}", citation.metric_id, value, citation.period);
        }
        output.push('\n');
    }

    if !answer.warnings.is_empty() {
        output.push_str("Warnings:\n");
        for warning in &answer.warnings {
            let _ = writeln!(output, "  - {warning}");
        }
        output.push('\n');
    }

    let stats = &answer.processing_stats;
    let _ = writeln!(
        output,
        "({:?}, {} chunks, {} facts extracted, {}ms)",
        stats.intent, stats.chunks_retrieved, stats.facts_extracted, stats.elapsed_ms
    );
    output
}

/// Formats a `facts` query response.
#[must_use]
pub fn format_facts(facts: &[Fact], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_facts_text(facts),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&facts),
    }
}

fn format_facts_text(facts: &[Fact]) -> String {
    if facts.is_empty() {
        return "No facts found.\n".to_string();
    }

    let mut output = String::new();
    let _ = writeln!(output, "{:<24} {:<14} {:<16} {:<6} Value", "Metric", "Period", "Scenario", "Auth");
    output.push_str(&"-".repeat(80));
    output.push('\n');

    for fact in facts {
        let value = fact.value.map_or_else(|| "masked".to_string(), |v| v.to_string());
        let auth = if fact.authoritative { "yes" } else { "no" };
        let _ = writeln!(
            output,
            "{:<24} {:<14} {:<16} {:<6} {} {}",
            fact.metric_id,
            fact.period_key,
            format!("{:?}", fact.scenario),
            auth,
            value,
            fact.unit
        );
    }
    output
}

/// Formats a value as JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an error for output.
///
/// When format is JSON, returns a structured error object.
/// When format is Text, returns the error message string.
#[must_use]
pub fn format_error(error: &crate::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let (error_type, suggestion) = get_error_details(error);
            let json = serde_json::json!({
                "success": false,
                "error": {
                    "type": error_type,
                    "message": error.to_string(),
                    "suggestion": suggestion
                }
            });
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// Extracts error type and recovery suggestion from an error.
fn get_error_details(error: &crate::Error) -> (&'static str, Option<&'static str>) {
    use crate::error::{CommandError, StorageError};

    match error {
        crate::Error::Storage(e) => match e {
            StorageError::NotInitialized => ("NotInitialized", Some("Run 'fincore init' to initialize the store")),
            StorageError::Migration(_) => ("MigrationError", Some("Run 'fincore reset' to rebuild the store")),
            StorageError::Database(_) => ("DatabaseError", None),
            StorageError::Serialization(_) => ("SerializationError", None),
        },
        crate::Error::Command(e) => match e {
            CommandError::UnknownCommand(_) => ("UnknownCommand", None),
            CommandError::InvalidArgument(_) => ("InvalidArgument", None),
            CommandError::MissingArgument(_) => ("MissingArgument", None),
            CommandError::ExecutionFailed(_) => ("ExecutionFailed", None),
        },
        crate::Error::Config { .. } => ("ConfigError", None),
        crate::Error::Ingest(_) => ("IngestError", Some("Check the document format is supported")),
        crate::Error::Normalize(_) => ("NormalizeError", None),
        crate::Error::Ontology(_) => ("OntologyError", Some("Check the ontology YAML is well-formed")),
        crate::Error::Retrieval(_) => ("RetrievalError", None),
        crate::Error::FactStore(_) => ("FactStoreError", None),
        crate::Error::Access(_) => ("AccessError", Some("Check the caller's role and tenant")),
        crate::Error::Orchestrator(_) => ("OrchestratorError", None),
        crate::Error::Io(_) => ("IoError", None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fact::ClassificationLevel;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("unknown"), OutputFormat::Text);
    }

    #[test]
    fn test_output_format_ndjson() {
        assert_eq!(OutputFormat::parse("ndjson"), OutputFormat::Ndjson);
        assert_eq!(OutputFormat::parse("NDJSON"), OutputFormat::Ndjson);
        assert_eq!(OutputFormat::parse("jsonl"), OutputFormat::Ndjson);
        assert_eq!(OutputFormat::parse("stream"), OutputFormat::Ndjson);
        assert!(OutputFormat::Ndjson.is_streaming());
        assert!(!OutputFormat::Json.is_streaming());
        assert!(!OutputFormat::Text.is_streaming());
    }

    #[test]
    fn test_format_status() {
        let status = EngineStatus { chunk_count: 10, fact_count: 4 };
        let text = format_status(&status, OutputFormat::Text);
        assert!(text.contains("Chunks indexed: 10"));
        assert!(text.contains("Facts visible:  4"));

        let json = format_status(&status, OutputFormat::Json);
        assert!(json.contains("\"chunk_count\": 10"));
    }

    #[test]
    fn test_format_document_failed() {
        let mut document = Document::new(
            "doc-1",
            "report.pdf",
            "hash",
            "acme",
            "mario.rossi",
            1_700_000_000,
            ClassificationLevel::Internal,
        );
        document.mark_failed("unsupported format");

        let text = format_document(&document, OutputFormat::Text);
        assert!(text.contains("failed"));
        assert!(text.contains("unsupported format"));
    }

    #[test]
    fn test_format_facts_empty() {
        let facts: Vec<Fact> = vec![];
        let text = format_facts(&facts, OutputFormat::Text);
        assert!(text.contains("No facts found"));

        let json = format_facts(&facts, OutputFormat::Json);
        assert!(json.contains("[]"));
    }
}
