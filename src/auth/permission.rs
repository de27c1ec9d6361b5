//! The Permission Evaluator: parses a dotted `scope.action` path and walks
//! the caller's capability matrix (spec.md §4.2, §2).

use crate::auth::context::AuthContext;

/// Outcome of evaluating a permission path against an `AuthContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allowed,
    /// Denied, carrying the literal permission path for the error message
    /// the dispatcher must surface verbatim (spec.md §4.3, §8).
    Denied,
}

/// Stateless evaluator: a dotted-path parser plus a capability-matrix walk.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionEvaluator;

impl PermissionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `permission_path` (`"scope.action"`) against `ctx`.
    ///
    /// Algorithm per spec.md §4.3:
    /// 1. No capability matrix at all → allowed (non-API-key principal).
    /// 2. Matrix present, scope missing → denied.
    /// 3. Matrix present, action missing or `false` → denied.
    pub fn evaluate(&self, ctx: &AuthContext, permission_path: &str) -> PermissionDecision {
        let Some(matrix) = &ctx.capability_matrix else {
            return PermissionDecision::Allowed;
        };

        let Some((scope, action)) = permission_path.split_once('.') else {
            // A malformed permission path is a programming error in the
            // tool catalog, not a caller's fault — deny defensively.
            return PermissionDecision::Denied;
        };

        if matrix.allows(scope, action) {
            PermissionDecision::Allowed
        } else {
            PermissionDecision::Denied
        }
    }

    /// The standard denial message, containing the literal permission path
    /// (spec.md §4.3: `"Permission denied: API key lacks 'secrets.create' permission."`).
    pub fn denial_message(permission_path: &str) -> String {
        format!("Permission denied: API key lacks '{permission_path}' permission.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::{CapabilityMatrix, Role};

    fn ctx_with(matrix: Option<CapabilityMatrix>) -> AuthContext {
        AuthContext {
            principal_id: "user-1".into(),
            tenant_id: "org-1".into(),
            roles: vec![Role::Member],
            authenticated: true,
            provider: "api-key".into(),
            capability_matrix: matrix,
        }
    }

    #[test]
    fn no_matrix_means_unrestricted() {
        let ctx = ctx_with(None);
        let eval = PermissionEvaluator::new();
        assert_eq!(
            eval.evaluate(&ctx, "secrets.create"),
            PermissionDecision::Allowed
        );
    }

    #[test]
    fn denied_scope_short_circuits() {
        let ctx = ctx_with(Some(
            CapabilityMatrix::new().deny("schedules", "create"),
        ));
        let eval = PermissionEvaluator::new();
        assert_eq!(
            eval.evaluate(&ctx, "schedules.create"),
            PermissionDecision::Denied
        );
    }

    #[test]
    fn denial_message_contains_literal_path() {
        let msg = PermissionEvaluator::denial_message("secrets.create");
        assert!(msg.contains("secrets.create"));
    }
}
