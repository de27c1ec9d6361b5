//! Audit Emitter: best-effort, fire-and-forget recording of security
//! relevant actions (spec.md §4.6).
//!
//! Grounded on `turbomcp_auth::audit::AuditLogger`'s structured-event
//! approach, adapted to the gateway's `AuditRecord` shape and its
//! detached-write contract: a write failure must never fail the
//! triggering operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::context::AuthContext;

/// Append-only audit entry (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Dotted verb, e.g. `secret.rotate`.
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub resource_name: Option<String>,
    /// Principal id, or `"public-link"` for unauthenticated resolution.
    pub actor: String,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AuditRecord {
    pub fn new(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        ctx: &AuthContext,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            resource_name: None,
            actor: ctx.principal_id.clone(),
            tenant_id: ctx.tenant_id.clone(),
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A sink an `AuditRecord` is durably written to. Implemented by the
/// backing audit store (out of scope per spec.md §1); the gateway never
/// retains a reference to the record after submission (spec.md §3,
/// "Ownership").
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, record: AuditRecord) -> Result<(), String>;

    /// `true` iff `ctx` may read audit records: ADMIN role, or an API key
    /// with `audit.read = true` (spec.md §4.6).
    fn can_read(&self, ctx: &AuthContext) -> bool {
        if ctx.is_admin() {
            return true;
        }
        ctx.capability_matrix
            .as_ref()
            .is_some_and(|m| m.allows("audit", "read"))
    }
}

/// Emits audit records on a detached task so the triggering tool call is
/// never slowed down or failed by a slow/unavailable audit store.
#[derive(Clone)]
pub struct AuditEmitter {
    sink: Arc<dyn AuditSink>,
}

impl AuditEmitter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Submit `record` for best-effort, asynchronous persistence.
    ///
    /// Per spec.md §4.6 and §9 ("Fire-and-forget writes"): the call
    /// returns immediately; the actual write happens on a spawned task
    /// whose failure is logged, never propagated, and never keeps the
    /// process alive past shutdown (a detached `tokio::spawn`, not a
    /// joined handle).
    pub fn emit(&self, record: AuditRecord) {
        let sink = self.sink.clone();
        let action = record.action.clone();
        tracing::info!(
            target: "audit::gateway",
            action = %record.action,
            resource_type = %record.resource_type,
            resource_id = %record.resource_id,
            actor = %record.actor,
            tenant_id = %record.tenant_id,
            "audit event"
        );
        tokio::spawn(async move {
            if let Err(e) = sink.write(record).await {
                tracing::warn!(target: "audit::gateway", action = %action, error = %e, "audit write failed, dropping");
            }
        });
    }

    pub fn can_read(&self, ctx: &AuthContext) -> bool {
        self.sink.can_read(ctx)
    }
}

/// In-memory sink for tests: records every write, and can be told to
/// always fail so the "audit safety" invariant (spec.md §8) can be
/// exercised without a real audit store.
#[derive(Default)]
pub struct InMemoryAuditSink {
    records: parking_lot::Mutex<Vec<AuditRecord>>,
    always_fail: bool,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_failing() -> Self {
        Self {
            records: parking_lot::Mutex::new(Vec::new()),
            always_fail: true,
        }
    }

    pub fn snapshot(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

#[async_trait::async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn write(&self, record: AuditRecord) -> Result<(), String> {
        if self.always_fail {
            return Err("audit store unreachable".to_string());
        }
        self.records.lock().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::Role;

    fn ctx() -> AuthContext {
        AuthContext {
            principal_id: "user-1".into(),
            tenant_id: "org-1".into(),
            roles: vec![Role::Member],
            authenticated: true,
            provider: "api-key".into(),
            capability_matrix: None,
        }
    }

    #[tokio::test]
    async fn emitted_record_eventually_reaches_sink() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let emitter = AuditEmitter::new(sink.clone());
        emitter.emit(AuditRecord::new("secret.rotate", "secret", "s-1", &ctx()));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(sink.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn failing_sink_does_not_panic_the_emitter() {
        let sink = Arc::new(InMemoryAuditSink::always_failing());
        let emitter = AuditEmitter::new(sink);
        emitter.emit(AuditRecord::new("secret.rotate", "secret", "s-1", &ctx()));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        // No panic, no propagated error: success by virtue of reaching here.
    }

    #[test]
    fn admin_can_read_audit_without_capability_matrix() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let mut admin = ctx();
        admin.roles = vec![Role::Admin];
        assert!(sink.can_read(&admin));
    }

    #[test]
    fn member_without_audit_read_cannot_read() {
        let sink = Arc::new(InMemoryAuditSink::new());
        assert!(!sink.can_read(&ctx()));
    }
}
