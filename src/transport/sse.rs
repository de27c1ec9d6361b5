//! Server-push stream support: pure SSE wire encoding plus the
//! broadcast-backed `TransportHandle` a session owns while its GET
//! stream is open (spec.md §4.2).

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::session::manager::SessionManager;
use crate::session::session::{SessionId, TransportHandle};

/// A single Server-Sent Event. Mirrors the wire shape `turbomcp`'s
/// streamable-HTTP transport emits: an optional id, an optional event
/// type, and a data payload terminated by a blank line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            id: None,
            data: data.into(),
        }
    }

    /// Render to the wire format consumed by an SSE client.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        if let Some(id) = &self.id {
            out.push_str(&format!("id: {id}\n"));
        }
        for line in self.data.lines() {
            out.push_str(&format!("data: {line}\n"));
        }
        out.push('\n');
        out
    }
}

/// Transport handle backing a session's open GET stream: a broadcast
/// sender the MCP handler pushes notifications onto, closed from either
/// side (`close()` from the session manager, or channel-drop when the
/// client disconnects).
pub struct BroadcastTransportHandle {
    sender: broadcast::Sender<SseEvent>,
}

impl BroadcastTransportHandle {
    pub fn new(capacity: usize) -> (Arc<Self>, broadcast::Receiver<SseEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Arc::new(Self { sender }), receiver)
    }

    pub fn push(&self, event: SseEvent) {
        // A lagging or absent receiver is not a transport failure — the
        // stream-open request may have already ended.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.sender.subscribe()
    }
}

impl TransportHandle for BroadcastTransportHandle {
    fn close(&self) {
        // Dropping the sender's last receiver terminates the stream
        // loop; the sender itself is dropped along with the session.
    }
}

/// Registers a close callback so an abruptly disconnected GET stream
/// frees its session within one TCP teardown (spec.md §4.2, "Stream
/// lifecycle"): destroying the guard destroys the session.
pub struct StreamCloseGuard {
    manager: SessionManager,
    session_id: SessionId,
}

impl StreamCloseGuard {
    pub fn new(manager: SessionManager, session_id: SessionId) -> Self {
        Self { manager, session_id }
    }
}

impl Drop for StreamCloseGuard {
    fn drop(&mut self) {
        self.manager.destroy(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_event_wire_format_ends_with_blank_line() {
        let event = SseEvent::message("hello");
        assert_eq!(event.to_wire(), "data: hello\n\n");
    }

    #[test]
    fn stream_close_guard_destroys_session_on_drop() {
        let manager = SessionManager::new();
        let session = manager.create(
            "user-1",
            "org-1",
            Arc::new(crate::session::session::NullTransportHandle),
        );
        assert_eq!(manager.active_count(), 1);
        {
            let _guard = StreamCloseGuard::new(manager.clone(), session.id.clone());
        }
        assert_eq!(manager.active_count(), 0);
    }
}
