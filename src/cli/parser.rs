//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fincore: a retrieval-augmented question-answering and metric-extraction
/// engine for heterogeneous financial documents.
#[derive(Parser, Debug)]
#[command(name = "fincore")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the fincore state database.
    ///
    /// Defaults to `.fincore/fincore-state.db` in the current directory.
    #[arg(short, long, env = "FINCORE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Path to the ontology YAML file.
    #[arg(long, env = "FINCORE_ONTOLOGY_PATH", default_value = "ontology.yaml")]
    pub ontology_path: PathBuf,

    /// Path to the guardrails YAML file.
    #[arg(long, env = "FINCORE_GUARDRAILS_PATH", default_value = "guardrails.yaml")]
    pub guardrails_path: PathBuf,

    /// Tenant the caller belongs to.
    #[arg(long, global = true, default_value = "default")]
    pub tenant: String,

    /// User id of the caller, recorded on ingested documents.
    #[arg(long, global = true, default_value = "cli-operator")]
    pub user: String,

    /// Caller role (admin, tenant-admin, bu-manager, analyst, viewer,
    /// platform-operator). Governs masking and entity/tenant scope.
    #[arg(long, global = true, default_value = "admin")]
    pub role: String,

    /// Classification ceiling the caller may see unmasked (public,
    /// internal, confidential, restricted).
    #[arg(long, global = true, default_value = "restricted")]
    pub clearance: String,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the fincore database.
    ///
    /// Creates the database file and schema if they don't exist.
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Show current store status (chunk and fact counts).
    Status,

    /// Reset fincore state (delete all data).
    Reset {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Ingest a document: extract, chunk, embed, and index it.
    Ingest {
        /// Path to the document file.
        file: PathBuf,

        /// Classification ceiling applied to every fact/chunk derived from
        /// this document (public, internal, confidential, restricted).
        #[arg(long, default_value = "internal")]
        classification: String,
    },

    /// Ask a question and get a sourced, guardrail-checked answer.
    Query {
        /// The question to ask.
        question: String,

        /// Maximum number of chunks retrieved before extraction.
        #[arg(long, default_value = "10")]
        top_k: usize,

        /// Persist newly extracted facts into the fact store.
        #[arg(long)]
        persist: bool,
    },

    /// Query the fact store directly, bypassing retrieval.
    Facts {
        /// Restrict to a canonical metric id.
        #[arg(long)]
        metric_id: Option<String>,

        /// Restrict to periods whose canonical string starts with this
        /// prefix (e.g. `"FY/2024"`, `"Q"`).
        #[arg(long)]
        period: Option<String>,

        /// Restrict to an entity.
        #[arg(long)]
        entity_id: Option<String>,

        /// Only return rows elected authoritative.
        #[arg(long)]
        authoritative_only: bool,
    },

    /// Manage the metric ontology.
    Ontology {
        #[command(subcommand)]
        command: OntologyCommands,
    },
}

/// Ontology subcommands.
#[derive(Subcommand, Debug)]
pub enum OntologyCommands {
    /// Hot-reload the ontology from its configured file.
    Reload,
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| PathBuf::from(crate::config::DEFAULT_DB_PATH))
    }
}
