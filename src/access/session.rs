//! Session store: the embedded table of active `UserContext`s.
//!
//! Mirrors the teacher's `SqliteStorage` connection-ownership pattern:
//! one struct wrapping a `rusqlite::Connection`, schema created in `init`,
//! typed query/insert helpers beneath a small trait so the orchestrator
//! never depends on the concrete backend.

use crate::access::role::Role;
use crate::core::fact::ClassificationLevel;
use crate::error::{Result, StorageError};
use rusqlite::{Connection, OptionalExtension, params};

/// Default session lifetime: `UserContext`s live for the duration of a
/// session, 8 hours by default.
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 8 * 60 * 60;

/// A persisted session row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session identifier.
    pub session_id: String,
    /// Authenticated user.
    pub user_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Role at the time of login.
    pub role: Role,
    /// Unix timestamp the session expires at.
    pub expires_at: i64,
}

/// Pluggable session storage, so the orchestrator never depends on the
/// concrete backend.
pub trait SessionStore: Send {
    /// Creates the session schema if it does not exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    fn init(&mut self) -> Result<()>;

    /// Inserts a new session, replacing any existing row with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn create(&mut self, session: &Session) -> Result<()>;

    /// Looks up a session by id. Returns `None` if it does not exist or has
    /// already been invalidated (logged out).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get(&self, session_id: &str) -> Result<Option<Session>>;

    /// Invalidates a session (logout).
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn invalidate(&mut self, session_id: &str) -> Result<()>;

    /// Deletes every session whose `expires_at` is at or before `now`.
    /// Returns the number of sessions reaped.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn reap_expired(&mut self, now: i64) -> Result<usize>;
}

/// `SQLite`-backed session store.
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Wraps an existing connection (typically the same database the fact
    /// store uses, so session and fact data share one file).
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

const CREATE_SESSIONS_SQL: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    tenant_id TEXT NOT NULL,
    role TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
";

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::TenantAdmin => "tenant_admin",
        Role::BuManager => "bu_manager",
        Role::Analyst => "analyst",
        Role::Viewer => "viewer",
        Role::PlatformOperator => "platform_operator",
    }
}

fn role_from_str(s: &str) -> Result<Role> {
    match s {
        "admin" => Ok(Role::Admin),
        "tenant_admin" => Ok(Role::TenantAdmin),
        "bu_manager" => Ok(Role::BuManager),
        "analyst" => Ok(Role::Analyst),
        "viewer" => Ok(Role::Viewer),
        "platform_operator" => Ok(Role::PlatformOperator),
        other => Err(StorageError::Serialization(format!("unknown role: {other}")).into()),
    }
}

impl SessionStore for SqliteSessionStore {
    fn init(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SESSIONS_SQL)
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(())
    }

    fn create(&mut self, session: &Session) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sessions (session_id, user_id, tenant_id, role, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session.session_id,
                    session.user_id,
                    session.tenant_id,
                    role_to_str(session.role),
                    session.expires_at,
                ],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let row = self
            .conn
            .query_row(
                "SELECT session_id, user_id, tenant_id, role, expires_at
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        row.map(|(session_id, user_id, tenant_id, role, expires_at)| {
            Ok(Session {
                session_id,
                user_id,
                tenant_id,
                role: role_from_str(&role)?,
                expires_at,
            })
        })
        .transpose()
    }

    fn invalidate(&mut self, session_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    fn reap_expired(&mut self, now: i64) -> Result<usize> {
        let count = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(count)
    }
}

/// Builds a `Session`'s default `accessible_entities`/`accessible_periods`
/// projection is deliberately not part of this module: those sets come
/// from the tenant's entity-assignment table (owned by `factstore`), not
/// from the session row itself, which only carries identity and role.
#[must_use]
pub fn default_classification_ceiling(role: Role) -> ClassificationLevel {
    match role {
        Role::Admin | Role::PlatformOperator => ClassificationLevel::Restricted,
        Role::TenantAdmin | Role::BuManager => ClassificationLevel::Confidential,
        Role::Analyst => ClassificationLevel::Internal,
        Role::Viewer => ClassificationLevel::Public,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteSessionStore {
        let conn = Connection::open_in_memory().unwrap();
        let mut store = SqliteSessionStore::new(conn);
        store.init().unwrap();
        store
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let mut store = store();
        let session = Session {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            tenant_id: "acme".to_string(),
            role: Role::Analyst,
            expires_at: 9_999_999_999,
        };
        store.create(&session).unwrap();
        let fetched = store.get("s1").unwrap().unwrap();
        assert_eq!(fetched, session);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = store();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_invalidate_removes_session() {
        let mut store = store();
        let session = Session {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            tenant_id: "acme".to_string(),
            role: Role::Viewer,
            expires_at: 9_999_999_999,
        };
        store.create(&session).unwrap();
        store.invalidate("s1").unwrap();
        assert!(store.get("s1").unwrap().is_none());
    }

    #[test]
    fn test_reap_expired() {
        let mut store = store();
        store
            .create(&Session {
                session_id: "expired".to_string(),
                user_id: "u1".to_string(),
                tenant_id: "acme".to_string(),
                role: Role::Viewer,
                expires_at: 100,
            })
            .unwrap();
        store
            .create(&Session {
                session_id: "live".to_string(),
                user_id: "u2".to_string(),
                tenant_id: "acme".to_string(),
                role: Role::Viewer,
                expires_at: 9_999_999_999,
            })
            .unwrap();
        let reaped = store.reap_expired(1000).unwrap();
        assert_eq!(reaped, 1);
        assert!(store.get("expired").unwrap().is_none());
        assert!(store.get("live").unwrap().is_some());
    }

    #[test]
    fn test_default_classification_ceiling_by_role() {
        assert_eq!(
            default_classification_ceiling(Role::Viewer),
            ClassificationLevel::Public
        );
        assert_eq!(
            default_classification_ceiling(Role::PlatformOperator),
            ClassificationLevel::Restricted
        );
    }
}
