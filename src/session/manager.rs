//! Session Manager: process-wide shared map of active sessions, with
//! identity-binding hijack prevention (spec.md §4.1, §8).

use std::sync::Arc;

use dashmap::DashMap;

use crate::session::session::{Session, SessionId, TransportHandle};

/// Failure modes for a session lookup, matching the HTTP-layer codes in
/// spec.md §4.1.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionLookupError {
    #[error("no such session")]
    NoSuchSession,
    /// Hijack prevention: the session exists, but the caller's principal
    /// or tenant differs from the one it was created with.
    #[error("session belongs to a different principal")]
    PrincipalMismatch,
}

/// Owns the set of active sessions. Backed by a concurrent map so reads
/// and writes from different request-handling tasks serialize correctly
/// without a single global lock (spec.md §4.1, "Concurrency").
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<DashMap<SessionId, Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Resolve `session_id` for a caller identified by `principal_id` /
    /// `tenant_id`. Fails closed: an identity mismatch is reported as
    /// `PrincipalMismatch` and the session is never handed back to the
    /// caller, whatever happens downstream (spec.md §8, "Session-identity
    /// binding").
    pub fn lookup(
        &self,
        session_id: &SessionId,
        principal_id: &str,
        tenant_id: &str,
    ) -> Result<Session, SessionLookupError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(SessionLookupError::NoSuchSession)?;

        if session.principal_id != principal_id || session.tenant_id != tenant_id {
            tracing::warn!(
                target: "gateway::session",
                session_id = %session_id,
                "rejected session lookup: identity mismatch"
            );
            return Err(SessionLookupError::PrincipalMismatch);
        }

        session.touch();
        Ok(session.clone())
    }

    /// Create and register a new session bound to `principal_id` /
    /// `tenant_id`. The returned session's id must be echoed back to the
    /// client via the initialize response header (spec.md §4.1).
    pub fn create(
        &self,
        principal_id: impl Into<String>,
        tenant_id: impl Into<String>,
        transport: Arc<dyn TransportHandle>,
    ) -> Session {
        let id = SessionId::new();
        let session = Session::new(id.clone(), principal_id, tenant_id, transport);
        self.sessions.insert(id, session.clone());
        tracing::info!(target: "gateway::session", session_id = %session.id, "session created");
        session
    }

    /// Destroy a session. Idempotent: destroying an unknown or
    /// already-destroyed session id is not an error (spec.md §4.1).
    pub fn destroy(&self, session_id: &SessionId) {
        if let Some((_, session)) = self.sessions.remove(session_id) {
            session.close_transport();
            tracing::info!(target: "gateway::session", session_id = %session_id, "session destroyed");
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Destroy every session that has been idle longer than
    /// `idle_timeout`, returning how many were reaped. Run periodically
    /// from a background task (SPEC_FULL.md §B, "Session idle expiry") —
    /// a client that opened a session and never sent a DELETE or another
    /// request leaks nothing forever.
    pub fn evict_idle(&self, idle_timeout: std::time::Duration) -> usize {
        let idle_timeout = chrono::Duration::from_std(idle_timeout).unwrap_or(chrono::Duration::zero());
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > idle_timeout)
            .map(|entry| entry.key().clone())
            .collect();

        let count = expired.len();
        for session_id in expired {
            self.destroy(&session_id);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::session::NullTransportHandle;

    fn manager() -> SessionManager {
        SessionManager::new()
    }

    #[test]
    fn lookup_unknown_session_fails() {
        let mgr = manager();
        let bogus = SessionId::from("mcp-does-not-exist");
        assert_eq!(
            mgr.lookup(&bogus, "user-1", "org-1").unwrap_err(),
            SessionLookupError::NoSuchSession
        );
    }

    #[test]
    fn lookup_succeeds_for_matching_identity() {
        let mgr = manager();
        let session = mgr.create("user-1", "org-1", Arc::new(NullTransportHandle));
        let found = mgr.lookup(&session.id, "user-1", "org-1").unwrap();
        assert_eq!(found.id, session.id);
    }

    #[test]
    fn session_hijack_is_rejected() {
        // Scenario 1 from spec.md §8: session created by user-1/org-1,
        // request arrives claiming user-1/org-2.
        let mgr = manager();
        let session = mgr.create("user-1", "org-1", Arc::new(NullTransportHandle));

        let err = mgr.lookup(&session.id, "user-1", "org-2").unwrap_err();
        assert_eq!(err, SessionLookupError::PrincipalMismatch);

        // The original session must still be present and reachable by
        // its rightful owner.
        assert!(mgr.lookup(&session.id, "user-1", "org-1").is_ok());
    }

    #[test]
    fn destroy_is_idempotent() {
        let mgr = manager();
        let session = mgr.create("user-1", "org-1", Arc::new(NullTransportHandle));
        mgr.destroy(&session.id);
        mgr.destroy(&session.id);
        assert_eq!(mgr.active_count(), 0);
    }

    #[test]
    fn evict_idle_reaps_only_stale_sessions() {
        let mgr = manager();
        let stale = mgr.create("user-1", "org-1", Arc::new(NullTransportHandle));
        std::thread::sleep(std::time::Duration::from_millis(20));
        let fresh = mgr.create("user-2", "org-1", Arc::new(NullTransportHandle));

        let reaped = mgr.evict_idle(std::time::Duration::from_millis(10));

        assert_eq!(reaped, 1);
        assert!(mgr.lookup(&stale.id, "user-1", "org-1").is_err());
        assert!(mgr.lookup(&fresh.id, "user-2", "org-1").is_ok());
    }
}
