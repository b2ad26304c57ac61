//! Error types for fincore operations.
//!
//! Mirrors the subsystem layout of the engine itself: one nested error enum
//! per component, composed into a single top-level `Error`. `thiserror`
//! drives all `Display`/`From` plumbing; exceptions are reserved for
//! programmer errors, everything recoverable is a typed variant.

use thiserror::Error;

/// Result type alias for fincore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for all fincore operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Ingestion and extraction errors.
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Normalization errors (numbers, periods, currencies).
    #[error("normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Ontology loading and label-mapping errors.
    #[error("ontology error: {0}")]
    Ontology(#[from] OntologyError),

    /// Hybrid retrieval errors.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Fact store errors (dedup, derivation, guardrails).
    #[error("fact store error: {0}")]
    FactStore(#[from] FactStoreError),

    /// Access control and tenancy errors.
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    /// Query orchestrator errors.
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Storage-layer errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Errors raised while routing and extracting ingested documents.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The file type could not be classified or has no registered extractor.
    #[error("unsupported format: {detail}")]
    UnsupportedFormat {
        /// Human-readable detail (never a raw file path).
        detail: String,
    },

    /// Every extractor registered for the detected format returned no content.
    #[error("extraction failed: {detail}")]
    ExtractionFailed {
        /// Human-readable detail.
        detail: String,
    },

    /// A specific page or sheet failed to extract; the document as a whole
    /// may still succeed if other blocks were extracted.
    #[error("partial extraction failure at {location}: {reason}")]
    PartialFailure {
        /// Page/sheet/table locator.
        location: String,
        /// Reason for the failure.
        reason: String,
    },

    /// No OCR backend is configured for a scanned document.
    #[error("OCR backend unavailable")]
    OcrUnavailable,
}

/// Errors raised while normalizing raw extracted values.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// The raw value could not be parsed as a number under any known locale.
    #[error("unparseable number: {raw}")]
    UnparseableNumber {
        /// The raw string that failed to parse.
        raw: String,
    },

    /// The raw value could not be parsed as a period.
    #[error("unparseable period: {raw}")]
    UnparseablePeriod {
        /// The raw string that failed to parse.
        raw: String,
    },

    /// A currency conversion was requested without a rate/source.
    #[error("missing conversion rate for {from} -> {to}")]
    MissingConversionRate {
        /// Source currency code.
        from: String,
        /// Target currency code.
        to: String,
    },
}

/// Errors raised by the ontology loader and label mapper.
#[derive(Error, Debug)]
pub enum OntologyError {
    /// The ontology YAML file could not be parsed.
    #[error("failed to parse ontology: {0}")]
    Parse(String),

    /// A `derivable_from` formula references an unknown metric.
    #[error("formula references unknown metric: {metric_id}")]
    UnknownMetric {
        /// The unknown metric id.
        metric_id: String,
    },

    /// The derivation graph contains a cycle.
    #[error("cyclic derivation detected involving: {metric_id}")]
    CyclicDerivation {
        /// A metric id on the cycle.
        metric_id: String,
    },

    /// A label matched no metric above the acceptance threshold.
    #[error("no confident mapping for label: {label}")]
    NoConfidentMapping {
        /// The unmapped raw label.
        label: String,
    },

    /// Two candidates scored within the ambiguity band and could not be
    /// disambiguated by domain hint.
    #[error("ambiguous mapping for label: {label}")]
    Ambiguous {
        /// The ambiguous raw label.
        label: String,
    },
}

/// Errors raised by the hybrid retriever.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Both the lexical and dense indices are unavailable.
    #[error("no retrieval strategy available")]
    NoStrategyAvailable,

    /// The embedding backend failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The lexical (BM25) index failed.
    #[error("lexical index error: {0}")]
    Lexical(String),
}

/// Errors raised by the fact store and its guardrails.
#[derive(Error, Debug)]
pub enum FactStoreError {
    /// Concurrent writers collided on the same dedup key beyond the retry budget.
    #[error("store concurrency error: {0}")]
    Concurrency(String),

    /// A derivation's inputs did not share period/perimeter.
    #[error("dimensional incoherence deriving {metric_id}")]
    DimensionalIncoherence {
        /// The metric id being derived.
        metric_id: String,
    },

    /// A fact referenced by id was not found.
    #[error("fact not found: {id}")]
    NotFound {
        /// The fact id.
        id: i64,
    },
}

/// Errors raised by access control and tenancy checks.
#[derive(Error, Debug)]
pub enum AccessError {
    /// The caller's session has expired or is unknown.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller's session is valid but lacks the requested scope.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Reason the request was denied.
        reason: String,
    },
}

/// Errors raised by the query orchestrator.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The query exceeded its allotted time budget.
    #[error("query timed out")]
    TimedOut,

    /// The query was cancelled by the caller.
    #[error("query cancelled")]
    Cancelled,

    /// The ingest queue is full.
    #[error("ingest queue full")]
    QueueFull,

    /// Too many concurrent queries are already in flight.
    #[error("overloaded")]
    Overloaded,
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Store not initialized (init command not run).
    #[error("fincore store not initialized. Run: fincore init")]
    NotInitialized,

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Unknown command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// Failed to read file.
    #[error("failed to read input: {reason}")]
    ReadFailed {
        /// Reason for failure (never a raw path, see masking rules).
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write output: {reason}")]
    WriteFailed {
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for OntologyError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config {
            message: "bad config".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad config");
    }

    #[test]
    fn test_ingest_error_display() {
        let err = IngestError::UnsupportedFormat {
            detail: "unknown magic bytes".to_string(),
        };
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn test_ontology_error_variants() {
        let err = OntologyError::CyclicDerivation {
            metric_id: "ebitda".to_string(),
        };
        assert!(err.to_string().contains("ebitda"));

        let err = OntologyError::Ambiguous {
            label: "margine".to_string(),
        };
        assert!(err.to_string().contains("margine"));
    }

    #[test]
    fn test_factstore_error_display() {
        let err = FactStoreError::DimensionalIncoherence {
            metric_id: "pfn".to_string(),
        };
        assert!(err.to_string().contains("pfn"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: Error = rusqlite_err.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }

    #[test]
    fn test_access_error_display() {
        let err = AccessError::Forbidden {
            reason: "classification ceiling exceeded".to_string(),
        };
        assert!(err.to_string().contains("forbidden"));
    }

    #[test]
    fn test_orchestrator_error_display() {
        assert_eq!(OrchestratorError::TimedOut.to_string(), "query timed out");
        assert_eq!(OrchestratorError::QueueFull.to_string(), "ingest queue full");
    }
}
