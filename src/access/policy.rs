//! Mask-vs-drop policy for rows above a caller's classification ceiling.

use crate::access::role::Role;

/// What happens to a row whose `classification_level` exceeds the caller's
/// ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskPolicy {
    /// Return the row with `value = None` and `masked = true`, so the
    /// caller knows the fact exists but cannot see it.
    Mask,
    /// Omit the row entirely.
    Drop,
}

/// Resolves the mask policy for a role. Roles with broader organizational
/// visibility (`BuManager` and above) are told a restricted fact exists but
/// not its value; `Viewer` and `Analyst` simply don't see the row.
#[must_use]
pub fn resolve_policy(role: Role) -> MaskPolicy {
    match role {
        Role::Admin | Role::TenantAdmin | Role::BuManager | Role::PlatformOperator => {
            MaskPolicy::Mask
        }
        Role::Analyst | Role::Viewer => MaskPolicy::Drop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_masks_rather_than_drops() {
        assert_eq!(resolve_policy(Role::Admin), MaskPolicy::Mask);
    }

    #[test]
    fn test_analyst_drops() {
        assert_eq!(resolve_policy(Role::Analyst), MaskPolicy::Drop);
    }
}
