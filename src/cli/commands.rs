//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

// Allow style choices for clarity
#![allow(clippy::too_many_lines)]
#![allow(clippy::option_if_let_else)]

use crate::access::{Role, UserContext};
use crate::cli::output::{OutputFormat, format_answer, format_document, format_facts, format_status};
use crate::cli::parser::{Cli, Commands, OntologyCommands};
use crate::core::fact::ClassificationLevel;
use crate::engine::Engine;
use crate::error::{CommandError, Result};
use crate::factstore::store::FactQuery;
use crate::orchestrator::AnswerOptions;
use std::collections::BTreeSet;
use std::io::Read;

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let ctx = build_user_context(cli)?;

    let mut config = crate::config::EngineConfig::default();
    config.db_path = cli.get_db_path();
    config.ontology_path = cli.ontology_path.clone();
    config.guardrails_path = cli.guardrails_path.clone();

    match &cli.command {
        Commands::Init { force } => cmd_init(&config, *force),
        Commands::Status => cmd_status(&config, &ctx, format),
        Commands::Reset { yes } => cmd_reset(&config, *yes),
        Commands::Ingest { file, classification } => cmd_ingest(&config, &ctx, file, classification, format),
        Commands::Query { question, top_k, persist } => {
            cmd_query(&config, &ctx, question, *top_k, *persist, format)
        }
        Commands::Facts { metric_id, period, entity_id, authoritative_only } => {
            cmd_facts(&config, &ctx, metric_id.as_deref(), period.as_deref(), entity_id.as_deref(), *authoritative_only, format)
        }
        Commands::Ontology { command } => match command {
            OntologyCommands::Reload => cmd_ontology_reload(&config),
        },
    }
}

fn build_user_context(cli: &Cli) -> Result<UserContext> {
    let role = parse_role(&cli.role)?;
    Ok(UserContext {
        user_id: cli.user.clone(),
        username: cli.user.clone(),
        tenant_id: cli.tenant.clone(),
        role,
        accessible_entities: BTreeSet::new(),
        accessible_periods: BTreeSet::new(),
        max_classification_level: ClassificationLevel::from_str_or_public(&cli.clearance),
        session_id: "cli".to_string(),
        session_expires_at: i64::MAX,
    })
}

fn parse_role(s: &str) -> Result<Role> {
    match s {
        "admin" => Ok(Role::Admin),
        "tenant-admin" | "tenant_admin" => Ok(Role::TenantAdmin),
        "bu-manager" | "bu_manager" => Ok(Role::BuManager),
        "analyst" => Ok(Role::Analyst),
        "viewer" => Ok(Role::Viewer),
        "platform-operator" | "platform_operator" => Ok(Role::PlatformOperator),
        other => Err(CommandError::InvalidArgument(format!("unknown role: {other}")).into()),
    }
}

fn cmd_init(config: &crate::config::EngineConfig, force: bool) -> Result<String> {
    if force && config.db_path.exists() {
        std::fs::remove_file(&config.db_path)?;
    }
    Engine::open(config)?;
    Ok(format!("Initialized fincore store at {}\n", config.db_path.display()))
}

fn cmd_status(config: &crate::config::EngineConfig, ctx: &UserContext, format: OutputFormat) -> Result<String> {
    let engine = open_existing(config)?;
    let status = engine.status(ctx)?;
    Ok(format_status(&status, format))
}

fn cmd_reset(config: &crate::config::EngineConfig, yes: bool) -> Result<String> {
    if !yes {
        return Err(CommandError::InvalidArgument("pass --yes to confirm reset".to_string()).into());
    }
    Engine::reset(config)?;
    Ok("fincore store reset.\n".to_string())
}

fn cmd_ingest(
    config: &crate::config::EngineConfig,
    ctx: &UserContext,
    file: &std::path::Path,
    classification: &str,
    format: OutputFormat,
) -> Result<String> {
    let engine = open_existing(config)?;
    let mut handle = std::fs::File::open(file)?;
    let mut bytes = Vec::new();
    handle.read_to_end(&mut bytes)?;

    let file_name = file.file_name().and_then(|n| n.to_str()).unwrap_or("document").to_string();
    let classification_level = ClassificationLevel::from_str_or_public(classification);

    let document =
        engine.submit_document(&bytes, &file_name, &ctx.tenant_id, &ctx.user_id, classification_level)?;
    Ok(format_document(&document, format))
}

fn cmd_query(
    config: &crate::config::EngineConfig,
    ctx: &UserContext,
    question: &str,
    top_k: usize,
    persist: bool,
    format: OutputFormat,
) -> Result<String> {
    let engine = open_existing(config)?;
    let options = AnswerOptions { top_k, persist_extracted_facts: persist };
    let answer = engine.answer(question, ctx, &options)?;
    Ok(format_answer(&answer, format))
}

fn cmd_facts(
    config: &crate::config::EngineConfig,
    ctx: &UserContext,
    metric_id: Option<&str>,
    period: Option<&str>,
    entity_id: Option<&str>,
    authoritative_only: bool,
    format: OutputFormat,
) -> Result<String> {
    let engine = open_existing(config)?;
    let query = FactQuery {
        entity_id: entity_id.map(ToString::to_string),
        metric_ids: metric_id.map(|m| vec![m.to_string()]),
        period_prefix: period.map(ToString::to_string),
        authoritative_only,
        ..FactQuery::default()
    };
    let facts = engine.query_facts(ctx, &query)?;
    Ok(format_facts(&facts, format))
}

fn cmd_ontology_reload(config: &crate::config::EngineConfig) -> Result<String> {
    let engine = open_existing(config)?;
    engine.reload_ontology(&config.ontology_path)?;
    Ok(format!("Reloaded ontology from {}\n", config.ontology_path.display()))
}

fn open_existing(config: &crate::config::EngineConfig) -> Result<Engine> {
    if !config.db_path.exists() {
        return Err(crate::error::StorageError::NotInitialized.into());
    }
    Engine::open(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_known() {
        assert_eq!(parse_role("admin").unwrap(), Role::Admin);
        assert_eq!(parse_role("analyst").unwrap(), Role::Analyst);
        assert_eq!(parse_role("platform-operator").unwrap(), Role::PlatformOperator);
    }

    #[test]
    fn test_parse_role_unknown_errors() {
        assert!(parse_role("superuser").is_err());
    }
}
