//! `AuthContext` and `CapabilityMatrix` — the caller's identity and
//! permission grant, derived once by the authentication middleware and
//! passed immutably downstream (spec.md §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Caller role, independent of any API-key capability matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Member,
}

/// Scope name understood by the capability matrix.
pub const SCOPES: &[&str] = &[
    "workflows",
    "runs",
    "artifacts",
    "secrets",
    "schedules",
    "human-inputs",
    "audit",
];

/// Action name understood by the capability matrix.
pub const ACTIONS: &[&str] = &[
    "list", "read", "run", "create", "update", "delete", "cancel", "resolve",
];

/// A two-level map: scope name → action name → permitted.
///
/// Absence of the matrix entirely (non-API-key principals) means
/// "unrestricted by the gateway" — tenant scoping still applies regardless.
/// Absence of a scope, or of an action within a scope, means denied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityMatrix {
    scopes: HashMap<String, HashMap<String, bool>>,
}

impl CapabilityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a single `scope.action` permission. Builder-style, used by
    /// tests and by the API-key provisioning path.
    pub fn grant(mut self, scope: impl Into<String>, action: impl Into<String>) -> Self {
        self.scopes
            .entry(scope.into())
            .or_default()
            .insert(action.into(), true);
        self
    }

    /// Explicitly deny a `scope.action` permission (distinct from simply
    /// never granting it — useful for tests of the short-circuit path).
    pub fn deny(mut self, scope: impl Into<String>, action: impl Into<String>) -> Self {
        self.scopes
            .entry(scope.into())
            .or_default()
            .insert(action.into(), false);
        self
    }

    /// Evaluate a dotted `scope.action` path against the matrix.
    ///
    /// Returns `false` if the scope is absent, if the action is absent
    /// within the scope, or if it is explicitly `false` — per spec.md §4.3
    /// steps 2-3.
    pub fn allows(&self, scope: &str, action: &str) -> bool {
        self.scopes
            .get(scope)
            .and_then(|actions| actions.get(action))
            .copied()
            .unwrap_or(false)
    }
}

/// The caller's identity and permission grant for the lifetime of a request
/// or session. Created by the authentication middleware; never mutated
/// once derived (spec.md §3).
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal_id: String,
    pub tenant_id: String,
    pub roles: Vec<Role>,
    pub authenticated: bool,
    pub provider: String,
    /// `None` for non-API-key principals: the gateway applies no
    /// permission restriction of its own (tenant scoping still applies).
    pub capability_matrix: Option<CapabilityMatrix>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// A synthetic context used for the `public-link` resolution path
    /// (spec.md §3, AuditRecord's `actor` field), where no bearer key is
    /// presented but a resource is reachable via an unauthenticated link.
    pub fn public_link(tenant_id: impl Into<String>) -> Self {
        Self {
            principal_id: "public-link".to_string(),
            tenant_id: tenant_id.into(),
            roles: vec![],
            authenticated: false,
            provider: "public-link".to_string(),
            capability_matrix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_scope_is_denied() {
        let matrix = CapabilityMatrix::new().grant("runs", "read");
        assert!(!matrix.allows("secrets", "create"));
    }

    #[test]
    fn absent_action_within_scope_is_denied() {
        let matrix = CapabilityMatrix::new().grant("runs", "read");
        assert!(!matrix.allows("runs", "cancel"));
    }

    #[test]
    fn explicit_false_is_denied() {
        let matrix = CapabilityMatrix::new().deny("schedules", "create");
        assert!(!matrix.allows("schedules", "create"));
    }

    #[test]
    fn granted_action_is_allowed() {
        let matrix = CapabilityMatrix::new().grant("workflows", "list");
        assert!(matrix.allows("workflows", "list"));
    }
}
