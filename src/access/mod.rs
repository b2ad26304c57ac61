//! Multi-tenant access control.
//!
//! Every service call takes a [`UserContext`] by reference; nothing in this
//! crate consults an ambient "current user"; the reasoning behind this
//! is recorded in `DESIGN.md`. `UserContext`
//! never survives onto a stored row except as its `tenant_id` /
//! `classification_level` projection.

pub mod masking;
pub mod policy;
pub mod role;
pub mod session;

pub use policy::{MaskPolicy, resolve_policy};
pub use role::Role;
pub use session::{Session, SessionStore, SqliteSessionStore};

use std::collections::BTreeSet;

use crate::core::fact::ClassificationLevel;

/// The authenticated caller of a request, threaded through every service
/// call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    /// Stable user identifier.
    pub user_id: String,
    /// Display name / login.
    pub username: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Role, governing masking policy and entity/tenant scope.
    pub role: Role,
    /// Entities this user may see. Ignored (full access) when `role` is
    /// `Admin` or `PlatformOperator`.
    pub accessible_entities: BTreeSet<String>,
    /// Period-key prefixes this user may see (e.g. `"FY/2024"`, `"Q"`
    /// matches any quarter). Empty means unrestricted.
    pub accessible_periods: BTreeSet<String>,
    /// Classification ceiling; facts above this level are masked or
    /// dropped per `MaskPolicy`.
    pub max_classification_level: ClassificationLevel,
    /// Session identifier this context was resolved from.
    pub session_id: String,
    /// Unix timestamp the session expires at.
    pub session_expires_at: i64,
}

impl UserContext {
    /// Whether `entity_id` is within this user's accessible set. Admins and
    /// platform operators see every entity in scope.
    #[must_use]
    pub fn can_access_entity(&self, entity_id: &str) -> bool {
        matches!(self.role, Role::Admin | Role::PlatformOperator)
            || self.accessible_entities.contains(entity_id)
    }

    /// Whether `period` (its canonical string form) is within this user's
    /// accessible periods. An empty restriction set means unrestricted.
    #[must_use]
    pub fn can_access_period(&self, period: &str) -> bool {
        self.accessible_periods.is_empty()
            || self.accessible_periods.iter().any(|p| period.starts_with(p.as_str()))
    }

    /// Whether this context may read a fact/chunk at `level` without
    /// masking or dropping.
    #[must_use]
    pub fn can_see_unmasked(&self, level: ClassificationLevel) -> bool {
        level <= self.max_classification_level
    }

    /// Whether another tenant's rows are visible to this context. Only
    /// `PlatformOperator` may cross tenant boundaries; `Admin` stays
    /// tenant-scoped.
    #[must_use]
    pub fn can_cross_tenant(&self) -> bool {
        self.role == Role::PlatformOperator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UserContext {
        UserContext {
            user_id: "u1".to_string(),
            username: "mario.rossi".to_string(),
            tenant_id: "acme".to_string(),
            role: Role::Analyst,
            accessible_entities: BTreeSet::from(["acme-spa".to_string()]),
            accessible_periods: BTreeSet::new(),
            max_classification_level: ClassificationLevel::Internal,
            session_id: "sess-1".to_string(),
            session_expires_at: 9_999_999_999,
        }
    }

    #[test]
    fn test_can_access_entity_respects_allowlist() {
        let ctx = sample();
        assert!(ctx.can_access_entity("acme-spa"));
        assert!(!ctx.can_access_entity("acme-srl"));
    }

    #[test]
    fn test_admin_bypasses_entity_allowlist() {
        let mut ctx = sample();
        ctx.role = Role::Admin;
        assert!(ctx.can_access_entity("anything"));
    }

    #[test]
    fn test_only_platform_operator_crosses_tenant() {
        let mut ctx = sample();
        assert!(!ctx.can_cross_tenant());
        ctx.role = Role::Admin;
        assert!(!ctx.can_cross_tenant());
        ctx.role = Role::PlatformOperator;
        assert!(ctx.can_cross_tenant());
    }

    #[test]
    fn test_can_see_unmasked_respects_ceiling() {
        let ctx = sample();
        assert!(ctx.can_see_unmasked(ClassificationLevel::Public));
        assert!(!ctx.can_see_unmasked(ClassificationLevel::Confidential));
    }
}
