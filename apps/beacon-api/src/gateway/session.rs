//! Per-connection session state.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::auth::Identity;

use super::events::Outbound;

/// A connected, authenticated client.
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    /// Resolved once at handshake and never changed afterwards.
    pub username: String,
    /// Community the user belongs to; `join_community` may only name this.
    pub home_community: String,
    community: RwLock<Option<String>>,
    outbox: mpsc::UnboundedSender<Outbound>,
}

impl Session {
    pub fn new(
        session_id: String,
        identity: Identity,
        outbox: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            session_id,
            user_id: identity.user_id,
            username: identity.username,
            home_community: identity.community,
            community: RwLock::new(None),
            outbox,
        }
    }

    /// Community chosen with `join_community`, if any.
    pub fn community(&self) -> Option<String> {
        self.community.read().clone()
    }

    pub fn set_community(&self, community: &str) {
        *self.community.write() = Some(community.to_string());
    }

    /// Queue an event for this session. Never blocks; returns `false` once
    /// the connection's writer is gone.
    pub fn send(&self, message: Outbound) -> bool {
        self.outbox.send(message).is_ok()
    }

    pub fn emit<T: Serialize>(&self, event: &'static str, payload: &T) -> bool {
        match serde_json::to_value(payload) {
            Ok(data) => self.send(Outbound::new(event, data)),
            Err(e) => {
                tracing::error!(?e, event, "failed to serialize outbound payload");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (Session, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let identity = Identity {
            user_id: "u1".into(),
            username: "ana".into(),
            community: "oak".into(),
        };
        (Session::new("ses_1".into(), identity, tx), rx)
    }

    #[test]
    fn community_is_unset_until_joined() {
        let (session, _rx) = session();
        assert!(session.community().is_none());
        assert_eq!(session.home_community, "oak");
        session.set_community("oak");
        assert_eq!(session.community().as_deref(), Some("oak"));
    }

    #[test]
    fn send_reports_closed_outbox() {
        let (session, mut rx) = session();
        assert!(session.emit("alert_error", &serde_json::json!({"error": "x"})));
        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.event, "alert_error");
        drop(rx);
        assert!(!session.emit("alert_error", &serde_json::json!({})));
    }
}
