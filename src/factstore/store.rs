//! Fact persistence and row-level access filtering.
//!
//! Mirrors the teacher's `SqliteStorage` connection-ownership pattern:
//! schema created in `init`, typed query/insert helpers behind a small
//! trait so the orchestrator never depends on the concrete backend.
//! `query_facts` is where row-level security lives — tenant,
//! entity, period, and classification filtering all happen here rather
//! than being left to callers to remember.

use crate::access::{MaskPolicy, UserContext, resolve_policy};
use crate::core::fact::{ClassificationLevel, DerivationInput, Fact, Perimeter, QualityFlag, Scenario};
use crate::core::period::{PeriodKey, PeriodType};
use crate::core::source_ref::SourceReference;
use crate::error::{AccessError, Result, StorageError};
use crate::factstore::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

/// A filter applied to a fact query, before row-level access control.
#[derive(Debug, Clone, Default)]
pub struct FactQuery {
    /// Restrict to a single entity.
    pub entity_id: Option<String>,
    /// Restrict to a set of canonical metric ids.
    pub metric_ids: Option<Vec<String>>,
    /// Restrict to periods whose canonical string starts with this prefix
    /// (e.g. `"Q"` for any quarter, `"FY/2024"` for a specific year).
    pub period_prefix: Option<String>,
    /// Restrict to a scenario.
    pub scenario: Option<Scenario>,
    /// Restrict to a perimeter.
    pub perimeter: Option<Perimeter>,
    /// Only return rows elected authoritative.
    pub authoritative_only: bool,
    /// Query another tenant's facts. Only honored when the caller's
    /// `UserContext::can_cross_tenant` is true; otherwise ignored and the
    /// caller's own tenant is used.
    pub tenant_id_override: Option<String>,
}

/// Persistence and row-level-filtered retrieval for facts.
pub trait FactStore: Send {
    /// Creates the fact store schema if it does not exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    fn init(&mut self) -> Result<()>;

    /// Inserts a new fact row (always an insert, never an update — revised
    /// extractions are kept as competing candidates, not overwrites).
    /// Returns the assigned row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn upsert_fact(&mut self, fact: &Fact) -> Result<i64>;

    /// Returns every existing row sharing `fact`'s dedup key, for election.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn candidates_for_dedup_key(&self, fact: &Fact) -> Result<Vec<Fact>>;

    /// Marks `winner_id` authoritative and every id in `loser_ids` not
    /// authoritative, within the same dedup group.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn mark_authoritative(&mut self, winner_id: i64, loser_ids: &[i64]) -> Result<()>;

    /// Queries facts matching `query`, filtered by `ctx`'s tenant, entity,
    /// period, and classification scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying query fails, or
    /// [`AccessError::Forbidden`] if `query.tenant_id_override` is set by a
    /// caller who cannot cross tenants.
    fn query_facts(&self, ctx: &UserContext, query: &FactQuery) -> Result<Vec<Fact>>;
}

/// `SQLite`-backed fact store.
pub struct SqliteFactStore {
    conn: Connection,
}

impl SqliteFactStore {
    /// Wraps an existing connection (typically shared with the session
    /// store, so session and fact data live in one database file).
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, rusqlite::params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl FactStore for SqliteFactStore {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        if is_init == 0 {
            self.conn.execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if self.get_schema_version()?.is_none() {
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        }
        Ok(())
    }

    fn upsert_fact(&mut self, fact: &Fact) -> Result<i64> {
        let dimensions_json = serde_json::to_string(&fact.dimensions).map_err(StorageError::from)?;
        let source_ref_json = serde_json::to_string(&fact.source_ref).map_err(StorageError::from)?;
        let calculated_from_json = fact
            .calculated_from
            .as_ref()
            .map(|inputs| serde_json::to_string(inputs))
            .transpose()
            .map_err(StorageError::from)?;
        let quality_flags_json = serde_json::to_string(&fact.quality_flags).map_err(StorageError::from)?;
        let dimensions_hash = crate::core::fact::hash_dimensions(&fact.dimensions) as i64;

        self.conn
            .execute(
                "INSERT INTO facts (
                    tenant_id, entity_id, metric_id, value, unit, currency,
                    period_type, period_year, period_index, period_start, period_end, period_str,
                    scenario, perimeter, dimensions, dimensions_hash, source_ref,
                    calculated_from, formula, quality_flags, classification_level,
                    created_at, authoritative
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)",
                rusqlite::params![
                    fact.tenant_id,
                    fact.entity_id,
                    fact.metric_id,
                    fact.value.map(|v| v.to_string()),
                    fact.unit,
                    fact.currency,
                    period_type_to_str(fact.period_key.period_type),
                    fact.period_key.year,
                    fact.period_key.index,
                    fact.period_key.start_date.to_string(),
                    fact.period_key.end_date.to_string(),
                    fact.period_key.to_string(),
                    scenario_to_str(fact.scenario),
                    perimeter_to_str(fact.perimeter),
                    dimensions_json,
                    dimensions_hash,
                    source_ref_json,
                    calculated_from_json,
                    fact.formula,
                    quality_flags_json,
                    fact.classification_level.as_str(),
                    fact.created_at,
                    i64::from(fact.authoritative),
                ],
            )
            .map_err(StorageError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn candidates_for_dedup_key(&self, fact: &Fact) -> Result<Vec<Fact>> {
        let dimensions_hash = crate::core::fact::hash_dimensions(&fact.dimensions) as i64;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, tenant_id, entity_id, metric_id, value, unit, currency,
                        period_type, period_year, period_index, period_start, period_end,
                        scenario, perimeter, dimensions, source_ref, calculated_from, formula,
                        quality_flags, classification_level, created_at, authoritative
                 FROM facts
                 WHERE tenant_id = ?1 AND entity_id = ?2 AND metric_id = ?3 AND period_str = ?4
                   AND scenario = ?5 AND perimeter = ?6 AND dimensions_hash = ?7",
            )
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(
                rusqlite::params![
                    fact.tenant_id,
                    fact.entity_id,
                    fact.metric_id,
                    fact.period_key.to_string(),
                    scenario_to_str(fact.scenario),
                    perimeter_to_str(fact.perimeter),
                    dimensions_hash,
                ],
                row_to_fact,
            )
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    fn mark_authoritative(&mut self, winner_id: i64, loser_ids: &[i64]) -> Result<()> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        tx.execute(
            "UPDATE facts SET authoritative = 1 WHERE id = ?1",
            rusqlite::params![winner_id],
        )
        .map_err(StorageError::from)?;
        for loser_id in loser_ids {
            tx.execute(
                "UPDATE facts SET authoritative = 0 WHERE id = ?1",
                rusqlite::params![loser_id],
            )
            .map_err(StorageError::from)?;
        }
        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn query_facts(&self, ctx: &UserContext, query: &FactQuery) -> Result<Vec<Fact>> {
        let tenant_id = match &query.tenant_id_override {
            Some(tenant) if tenant != &ctx.tenant_id => {
                if !ctx.can_cross_tenant() {
                    return Err(AccessError::Forbidden {
                        reason: "caller may not query another tenant's facts".to_string(),
                    }
                    .into());
                }
                tenant.clone()
            }
            _ => ctx.tenant_id.clone(),
        };

        let mut sql = String::from(
            "SELECT id, tenant_id, entity_id, metric_id, value, unit, currency,
                    period_type, period_year, period_index, period_start, period_end,
                    scenario, perimeter, dimensions, source_ref, calculated_from, formula,
                    quality_flags, classification_level, created_at, authoritative
             FROM facts WHERE tenant_id = ?",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(tenant_id)];

        let unrestricted_entities = matches!(
            ctx.role,
            crate::access::Role::Admin | crate::access::Role::PlatformOperator
        );

        if let Some(entity_id) = &query.entity_id {
            if !unrestricted_entities && !ctx.can_access_entity(entity_id) {
                return Ok(Vec::new());
            }
            sql.push_str(" AND entity_id = ?");
            args.push(Box::new(entity_id.clone()));
        } else if !unrestricted_entities && !ctx.accessible_entities.is_empty() {
            let placeholders = vec!["?"; ctx.accessible_entities.len()].join(",");
            sql.push_str(&format!(" AND entity_id IN ({placeholders})"));
            for entity_id in &ctx.accessible_entities {
                args.push(Box::new(entity_id.clone()));
            }
        }

        if let Some(metric_ids) = &query.metric_ids {
            if metric_ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; metric_ids.len()].join(",");
            sql.push_str(&format!(" AND metric_id IN ({placeholders})"));
            for metric_id in metric_ids {
                args.push(Box::new(metric_id.clone()));
            }
        }

        if let Some(scenario) = query.scenario {
            sql.push_str(" AND scenario = ?");
            args.push(Box::new(scenario_to_str(scenario)));
        }

        if let Some(perimeter) = query.perimeter {
            sql.push_str(" AND perimeter = ?");
            args.push(Box::new(perimeter_to_str(perimeter)));
        }

        if query.authoritative_only {
            sql.push_str(" AND authoritative = 1");
        }

        let mut stmt = self.conn.prepare(&sql).map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter().map(std::convert::AsRef::as_ref)), row_to_fact)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        let mask_policy = resolve_policy(ctx.role);
        let filtered = rows
            .into_iter()
            .filter(|fact| query.period_prefix.as_ref().is_none_or(|prefix| fact.period_key.to_string().starts_with(prefix.as_str())))
            .filter(|fact| ctx.can_access_period(&fact.period_key.to_string()))
            .filter_map(|fact| mask_or_drop(fact, ctx, mask_policy))
            .collect();

        Ok(filtered)
    }
}

fn mask_or_drop(mut fact: Fact, ctx: &UserContext, policy: MaskPolicy) -> Option<Fact> {
    if ctx.can_see_unmasked(fact.classification_level) {
        return Some(fact);
    }
    match policy {
        MaskPolicy::Drop => None,
        MaskPolicy::Mask => {
            fact.value = None;
            fact.masked = true;
            Some(fact)
        }
    }
}

fn row_to_fact(row: &Row<'_>) -> rusqlite::Result<Fact> {
    let value: Option<String> = row.get(4)?;
    let dimensions_json: String = row.get(14)?;
    let source_ref_json: String = row.get(15)?;
    let calculated_from_json: Option<String> = row.get(16)?;
    let quality_flags_json: String = row.get(18)?;

    let dimensions: BTreeMap<String, String> = serde_json::from_str(&dimensions_json).unwrap_or_default();
    let source_ref: SourceReference =
        serde_json::from_str(&source_ref_json).map_err(|e| rusqlite::Error::FromSqlConversionFailure(15, rusqlite::types::Type::Text, Box::new(e)))?;
    let calculated_from: Option<Vec<DerivationInput>> = calculated_from_json
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(16, rusqlite::types::Type::Text, Box::new(e)))?;
    let quality_flags: Vec<QualityFlag> = serde_json::from_str(&quality_flags_json).unwrap_or_default();

    Ok(Fact {
        id: Some(row.get(0)?),
        tenant_id: row.get(1)?,
        entity_id: row.get(2)?,
        metric_id: row.get(3)?,
        value: value.and_then(|v| Decimal::from_str(&v).ok()),
        unit: row.get(5)?,
        currency: row.get(6)?,
        period_key: PeriodKey {
            period_type: period_type_from_str(&row.get::<_, String>(7)?),
            year: row.get(8)?,
            index: row.get(9)?,
            start_date: chrono::NaiveDate::parse_from_str(&row.get::<_, String>(10)?, "%Y-%m-%d")
                .unwrap_or_default(),
            end_date: chrono::NaiveDate::parse_from_str(&row.get::<_, String>(11)?, "%Y-%m-%d")
                .unwrap_or_default(),
        },
        scenario: scenario_from_str(&row.get::<_, String>(12)?),
        perimeter: perimeter_from_str(&row.get::<_, String>(13)?),
        dimensions,
        source_ref,
        calculated_from,
        formula: row.get(17)?,
        quality_flags,
        classification_level: ClassificationLevel::from_str_or_public(&row.get::<_, String>(19)?),
        created_at: row.get(20)?,
        authoritative: row.get::<_, i64>(21)? != 0,
        masked: false,
    })
}

fn period_type_to_str(kind: PeriodType) -> &'static str {
    match kind {
        PeriodType::Fy => "FY",
        PeriodType::Q => "Q",
        PeriodType::M => "M",
        PeriodType::H => "H",
        PeriodType::Ytd => "YTD",
        PeriodType::Custom => "CUSTOM",
    }
}

fn period_type_from_str(s: &str) -> PeriodType {
    match s {
        "Q" => PeriodType::Q,
        "M" => PeriodType::M,
        "H" => PeriodType::H,
        "YTD" => PeriodType::Ytd,
        "CUSTOM" => PeriodType::Custom,
        _ => PeriodType::Fy,
    }
}

fn scenario_to_str(scenario: Scenario) -> &'static str {
    match scenario {
        Scenario::Actual => "actual",
        Scenario::Budget => "budget",
        Scenario::Forecast => "forecast",
        Scenario::Unspecified => "unspecified",
    }
}

fn scenario_from_str(s: &str) -> Scenario {
    match s {
        "budget" => Scenario::Budget,
        "forecast" => Scenario::Forecast,
        "unspecified" => Scenario::Unspecified,
        _ => Scenario::Actual,
    }
}

fn perimeter_to_str(perimeter: Perimeter) -> &'static str {
    match perimeter {
        Perimeter::Statutory => "statutory",
        Perimeter::Consolidated => "consolidated",
        Perimeter::Management => "management",
        Perimeter::Unspecified => "unspecified",
    }
}

fn perimeter_from_str(s: &str) -> Perimeter {
    match s {
        "consolidated" => Perimeter::Consolidated,
        "management" => Perimeter::Management,
        "unspecified" => Perimeter::Unspecified,
        _ => Perimeter::Statutory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::core::source_ref::SourceType;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn store() -> SqliteFactStore {
        let conn = Connection::open_in_memory().unwrap();
        let mut store = SqliteFactStore::new(conn);
        store.init().unwrap();
        store
    }

    fn sample_fact(entity_id: &str, classification: ClassificationLevel) -> Fact {
        Fact {
            id: None,
            tenant_id: "acme".to_string(),
            entity_id: entity_id.to_string(),
            metric_id: "ricavi".to_string(),
            value: Some(Decimal::from(1000)),
            unit: "currency".to_string(),
            currency: Some("EUR".to_string()),
            period_key: PeriodKey::fy(
                2024,
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            ),
            scenario: Scenario::Actual,
            perimeter: Perimeter::Statutory,
            dimensions: BTreeMap::new(),
            source_ref: SourceReference::narrative(
                "bilancio.pdf",
                "hash",
                SourceType::PdfNative,
                Some(5),
                "pdf-extract",
                0,
                0.95,
            ),
            calculated_from: None,
            formula: None,
            quality_flags: Vec::new(),
            classification_level: classification,
            created_at: 1000,
            authoritative: true,
            masked: false,
        }
    }

    fn ctx(role: Role, entities: &[&str], ceiling: ClassificationLevel) -> UserContext {
        UserContext {
            user_id: "u1".to_string(),
            username: "mario".to_string(),
            tenant_id: "acme".to_string(),
            role,
            accessible_entities: entities.iter().map(|s| (*s).to_string()).collect::<BTreeSet<_>>(),
            accessible_periods: BTreeSet::new(),
            max_classification_level: ceiling,
            session_id: "s1".to_string(),
            session_expires_at: 9_999_999_999,
        }
    }

    #[test]
    fn test_roundtrip_insert_and_query() {
        let mut store = store();
        let fact = sample_fact("acme-spa", ClassificationLevel::Internal);
        store.upsert_fact(&fact).unwrap();

        let context = ctx(Role::Analyst, &["acme-spa"], ClassificationLevel::Internal);
        let results = store.query_facts(&context, &FactQuery::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, Some(Decimal::from(1000)));
    }

    #[test]
    fn test_entity_allowlist_excludes_other_entities() {
        let mut store = store();
        store.upsert_fact(&sample_fact("acme-spa", ClassificationLevel::Internal)).unwrap();
        store.upsert_fact(&sample_fact("acme-srl", ClassificationLevel::Internal)).unwrap();

        let context = ctx(Role::Analyst, &["acme-spa"], ClassificationLevel::Internal);
        let results = store.query_facts(&context, &FactQuery::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity_id, "acme-spa");
    }

    #[test]
    fn test_analyst_drops_above_ceiling() {
        let mut store = store();
        store
            .upsert_fact(&sample_fact("acme-spa", ClassificationLevel::Restricted))
            .unwrap();

        let context = ctx(Role::Analyst, &["acme-spa"], ClassificationLevel::Internal);
        let results = store.query_facts(&context, &FactQuery::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_bu_manager_masks_above_ceiling() {
        let mut store = store();
        store
            .upsert_fact(&sample_fact("acme-spa", ClassificationLevel::Restricted))
            .unwrap();

        let context = ctx(Role::BuManager, &["acme-spa"], ClassificationLevel::Confidential);
        let results = store.query_facts(&context, &FactQuery::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].masked);
        assert!(results[0].value.is_none());
    }

    #[test]
    fn test_cross_tenant_forbidden_without_platform_operator() {
        let mut store = store();
        store.upsert_fact(&sample_fact("acme-spa", ClassificationLevel::Internal)).unwrap();

        let context = ctx(Role::Admin, &["acme-spa"], ClassificationLevel::Restricted);
        let query = FactQuery {
            tenant_id_override: Some("other-tenant".to_string()),
            ..Default::default()
        };
        assert!(store.query_facts(&context, &query).is_err());
    }

    #[test]
    fn test_dedup_candidates_share_key() {
        let mut store = store();
        let a = sample_fact("acme-spa", ClassificationLevel::Internal);
        let mut b = a.clone();
        b.source_ref.page = Some(9);
        store.upsert_fact(&a).unwrap();
        store.upsert_fact(&b).unwrap();

        let candidates = store.candidates_for_dedup_key(&a).unwrap();
        assert_eq!(candidates.len(), 2);
    }
}
