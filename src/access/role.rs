//! Role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A user's role within a tenant, governing entity scope and mask policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Full access within the tenant; bypasses entity allowlists.
    Admin,
    /// Tenant-wide management access, scoped like `Admin` but without some
    /// platform-level privileges (session revocation, ontology reload).
    TenantAdmin,
    /// Scoped to a business unit's accessible entities.
    BuManager,
    /// Read/query access, entity- and period-restricted.
    Analyst,
    /// Read-only, most restricted classification ceiling by default.
    Viewer,
    /// Cross-tenant operator role, for platform-level administration across
    /// question about cross-tenant admin visibility without overloading
    /// the tenant-scoped `Admin` role.
    PlatformOperator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Admin => "admin",
            Self::TenantAdmin => "tenant_admin",
            Self::BuManager => "bu_manager",
            Self::Analyst => "analyst",
            Self::Viewer => "viewer",
            Self::PlatformOperator => "platform_operator",
        };
        f.write_str(s)
    }
}
