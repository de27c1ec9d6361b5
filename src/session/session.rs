//! `SessionId` and `Session` — bound to one MCP client for its lifetime
//! (spec.md §3).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Opaque, cryptographically random session identifier.
///
/// Mirrors `turbomcp_transport_streamable::SessionId`'s intent — 128 bits
/// of entropy, unguessable, formatted with a recognizable prefix — using
/// `uuid`'s v4 generator (already a workspace dependency for task ids)
/// rather than a direct CSPRNG call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("mcp-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A transport handle a session owns exclusively: the channel used to
/// push server-initiated messages down the GET stream (spec.md §4.2).
/// Kept generic over what the transport layer actually needs so this
/// module has no axum dependency.
pub trait TransportHandle: Send + Sync {
    /// Close the push stream associated with this session, if any is open.
    fn close(&self);
}

/// A no-op handle for sessions that have not (yet) opened a GET stream.
pub struct NullTransportHandle;
impl TransportHandle for NullTransportHandle {
    fn close(&self) {}
}

/// An MCP session bound to exactly one principal/tenant for its lifetime
/// (spec.md §3, invariant b).
#[derive(Clone)]
pub struct Session {
    pub id: SessionId,
    pub principal_id: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    transport: Arc<dyn TransportHandle>,
    /// Shared across clones so `touch()` from any handler updates the
    /// one the idle reaper reads (SPEC_FULL.md §B, "Session idle expiry").
    last_activity: Arc<Mutex<DateTime<Utc>>>,
}

impl Session {
    pub fn new(
        id: SessionId,
        principal_id: impl Into<String>,
        tenant_id: impl Into<String>,
        transport: Arc<dyn TransportHandle>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            principal_id: principal_id.into(),
            tenant_id: tenant_id.into(),
            created_at: now,
            transport,
            last_activity: Arc::new(Mutex::new(now)),
        }
    }

    /// Close this session's owned transport handle. Called by the
    /// manager on destruction; idempotent from the caller's perspective
    /// because `TransportHandle::close` is expected to be.
    pub fn close_transport(&self) {
        self.transport.close();
    }

    /// Record activity on this session, resetting its idle clock.
    pub fn touch(&self) {
        *self.last_activity.lock() = Utc::now();
    }

    pub fn idle_for(&self) -> chrono::Duration {
        Utc::now() - *self.last_activity.lock()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("principal_id", &self.principal_id)
            .field("tenant_id", &self.tenant_id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn session_id_display_matches_as_str() {
        let id = SessionId::new();
        assert_eq!(format!("{id}"), id.as_str());
    }
}
