//! Connection lifecycle and client event dispatch.
//!
//! Transport-agnostic: the Socket.IO layer hands every authenticated
//! connection an outbox and forwards incoming events to [`Gateway::dispatch`].

use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::auth::{AuthError, Identity, IdentityVerifier};
use crate::config::Config;
use crate::db::store::Store;
use crate::models::message::{ChatMessage, ParentKind};

use super::error::{GatewayError, ACCESS_DENIED, EVENT_NOT_FOUND};
use super::events::{
    AlertTyping, ClientEvent, ErrorPayload, EventName, EventTyping, Outbound, SendAlertMessage,
    SendEventMessage,
};
use super::presence::PresenceTracker;
use super::registry::RoomRegistry;
use super::relay::{Author, MessageRelay};
use super::rooms::Room;
use super::session::Session;
use super::typing::TypingRelay;

pub struct Gateway {
    verifier: Arc<dyn IdentityVerifier>,
    store: Arc<dyn Store>,
    registry: Arc<RoomRegistry>,
    presence: PresenceTracker,
    typing: TypingRelay,
    alerts: MessageRelay,
    events: MessageRelay,
    sessions: DashMap<String, Arc<Session>>,
}

impl Gateway {
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        store: Arc<dyn Store>,
        registry: Arc<RoomRegistry>,
        config: &Config,
    ) -> Self {
        let relay = |kind| {
            MessageRelay::new(
                kind,
                store.clone(),
                registry.clone(),
                config.persist_timeout,
                config.trust_client_timestamps,
            )
        };
        Self {
            alerts: relay(ParentKind::Alert),
            events: relay(ParentKind::Event),
            presence: PresenceTracker::new(registry.clone()),
            typing: TypingRelay::new(registry.clone()),
            verifier,
            store,
            registry,
            sessions: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn relay(&self, kind: ParentKind) -> &MessageRelay {
        match kind {
            ParentKind::Alert => &self.alerts,
            ParentKind::Event => &self.events,
        }
    }

    /// Resolve a handshake credential. Nothing is registered on failure.
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        self.verifier.verify(credential).await
    }

    /// Admit an authenticated connection.
    pub fn connect(
        &self,
        session_id: String,
        identity: Identity,
        outbox: mpsc::UnboundedSender<Outbound>,
    ) -> Arc<Session> {
        if self.sessions.contains_key(&session_id) {
            tracing::warn!(session_id, "session id reused, dropping previous session");
            self.disconnect(&session_id);
        }
        let session = Arc::new(Session::new(session_id.clone(), identity, outbox));
        self.registry.attach(session.clone());
        self.sessions.insert(session_id, session.clone());
        tracing::info!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            username = %session.username,
            "session connected"
        );
        session
    }

    /// Tear a session down: leave every room with presence updates and
    /// forget it. Returns `false` if the session was already gone, so
    /// cleanup runs once no matter how many close paths fire.
    pub fn disconnect(&self, session_id: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(session_id) else {
            return false;
        };
        let rooms = self.presence.depart(session_id);
        tracing::info!(
            session_id,
            user_id = %session.user_id,
            rooms = rooms.len(),
            "session disconnected"
        );
        true
    }

    pub fn session(&self, session_id: &str) -> Result<Arc<Session>, GatewayError> {
        self.sessions
            .get(session_id)
            .map(|s| s.value().clone())
            .ok_or(GatewayError::UnknownSession)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Sorted usernames present in `room`.
    pub fn online(&self, room: &Room) -> Vec<String> {
        self.presence.online(room)
    }

    // -----------------------------------------------------------------------
    // Client events
    // -----------------------------------------------------------------------

    /// Handle one client event. Any failure is reported to the requester as
    /// exactly one error event and also returned.
    pub async fn dispatch(
        &self,
        session_id: &str,
        event: &str,
        payload: Value,
    ) -> Result<(), GatewayError> {
        let (error_event, result) = match event {
            ClientEvent::JOIN_COMMUNITY => (
                EventName::ALERT_ERROR,
                match parse_id(&payload, "communityName") {
                    Ok(name) => self.join_community(session_id, &name),
                    Err(e) => Err(e),
                },
            ),
            ClientEvent::JOIN_ALERT => (
                EventName::ALERT_ERROR,
                match parse_id(&payload, "alertId") {
                    Ok(id) => self.join_alert(session_id, &id).await,
                    Err(e) => Err(e),
                },
            ),
            ClientEvent::LEAVE_ALERT => (
                EventName::ALERT_ERROR,
                parse_id(&payload, "alertId").and_then(|id| self.leave_alert(session_id, &id)),
            ),
            ClientEvent::JOIN_EVENT => (
                EventName::MESSAGE_ERROR,
                match parse_id(&payload, "eventId") {
                    Ok(id) => self.join_event(session_id, &id).await,
                    Err(e) => Err(e),
                },
            ),
            ClientEvent::LEAVE_EVENT => (
                EventName::MESSAGE_ERROR,
                parse_id(&payload, "eventId").and_then(|id| self.leave_event(session_id, &id)),
            ),
            ClientEvent::SEND_ALERT_MESSAGE => (
                EventName::ALERT_MESSAGE_ERROR,
                match parse::<SendAlertMessage>(payload) {
                    Ok(p) => self.send_alert_message(session_id, p).await.map(|_| ()),
                    Err(e) => Err(e),
                },
            ),
            ClientEvent::SEND_EVENT_MESSAGE => (
                EventName::MESSAGE_ERROR,
                match parse::<SendEventMessage>(payload) {
                    Ok(p) => self.send_event_message(session_id, p).await.map(|_| ()),
                    Err(e) => Err(e),
                },
            ),
            ClientEvent::ALERT_USER_TYPING => (
                EventName::ALERT_ERROR,
                parse::<AlertTyping>(payload)
                    .and_then(|p| self.alert_typing(session_id, &p.alert_id)),
            ),
            ClientEvent::USER_TYPING => (
                EventName::MESSAGE_ERROR,
                parse::<EventTyping>(payload)
                    .and_then(|p| self.event_typing(session_id, &p.event_id)),
            ),
            other => {
                tracing::debug!(session_id, event = other, "ignoring unknown client event");
                return Ok(());
            }
        };

        if let Err(err) = &result {
            self.report(session_id, event, error_event, err);
        }
        result
    }

    pub fn join_community(&self, session_id: &str, name: &str) -> Result<(), GatewayError> {
        let session = self.session(session_id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::Validation("communityName is required".into()));
        }

        if name != session.home_community {
            return Err(GatewayError::Forbidden(ACCESS_DENIED));
        }

        session.set_community(name);
        let room = Room::Community(name.to_string());
        self.presence.join(&room, session_id);
        tracing::info!(session_id, user_id = %session.user_id, %room, "joined community");
        Ok(())
    }

    pub async fn join_alert(&self, session_id: &str, alert_id: &str) -> Result<(), GatewayError> {
        let session = self.session(session_id)?;
        let community = session.community();
        self.alerts
            .authorize(alert_id, self.author(&session, community.as_deref()))
            .await?;

        // The session may have gone away while the lookup was in flight.
        self.session(session_id)?;
        let room = Room::Alert(alert_id.to_string());
        self.presence.join(&room, session_id);
        tracing::info!(session_id, user_id = %session.user_id, %room, "joined alert room");
        Ok(())
    }

    pub fn leave_alert(&self, session_id: &str, alert_id: &str) -> Result<(), GatewayError> {
        self.session(session_id)?;
        self.presence
            .leave(&Room::Alert(alert_id.to_string()), session_id);
        Ok(())
    }

    pub async fn join_event(&self, session_id: &str, event_id: &str) -> Result<(), GatewayError> {
        let session = self.session(session_id)?;
        let found = self.store.find_event(event_id).await.map_err(|e| {
            tracing::error!(?e, event_id, "event lookup failed");
            GatewayError::Internal
        })?;
        if found.is_none() {
            return Err(GatewayError::ParentNotFound(EVENT_NOT_FOUND));
        }

        self.session(session_id)?;
        let room = Room::Event(event_id.to_string());
        self.presence.join(&room, session_id);
        tracing::info!(session_id, user_id = %session.user_id, %room, "joined event room");
        Ok(())
    }

    pub fn leave_event(&self, session_id: &str, event_id: &str) -> Result<(), GatewayError> {
        self.session(session_id)?;
        self.presence
            .leave(&Room::Event(event_id.to_string()), session_id);
        Ok(())
    }

    pub async fn send_alert_message(
        &self,
        session_id: &str,
        payload: SendAlertMessage,
    ) -> Result<ChatMessage, GatewayError> {
        let session = self.session(session_id)?;
        let community = session.community();
        self.alerts
            .send(
                &payload.alert_id,
                self.author(&session, community.as_deref()),
                &payload.message,
                payload.timestamp.as_deref(),
            )
            .await
    }

    pub async fn send_event_message(
        &self,
        session_id: &str,
        payload: SendEventMessage,
    ) -> Result<ChatMessage, GatewayError> {
        let session = self.session(session_id)?;
        let community = session.community();
        self.events
            .send(
                &payload.event_id,
                self.author(&session, community.as_deref()),
                &payload.message,
                payload.timestamp.as_deref(),
            )
            .await
    }

    pub fn alert_typing(&self, session_id: &str, alert_id: &str) -> Result<(), GatewayError> {
        self.typing
            .signal(&Room::Alert(alert_id.to_string()), session_id)
            .map(|_| ())
    }

    pub fn event_typing(&self, session_id: &str, event_id: &str) -> Result<(), GatewayError> {
        self.typing
            .signal(&Room::Event(event_id.to_string()), session_id)
            .map(|_| ())
    }

    fn author<'a>(&self, session: &'a Session, community: Option<&'a str>) -> Author<'a> {
        Author {
            user_id: &session.user_id,
            username: &session.username,
            community,
        }
    }

    fn report(&self, session_id: &str, event: &str, error_event: &'static str, err: &GatewayError) {
        tracing::warn!(session_id, event, error = %err, "client event rejected");
        let Some(session) = self.sessions.get(session_id).map(|s| s.value().clone()) else {
            return;
        };
        session.emit(
            error_event,
            &ErrorPayload {
                error: err.to_string(),
            },
        );
    }
}

/// Accept either a bare id string or an object carrying `field`.
fn parse_id(payload: &Value, field: &str) -> Result<String, GatewayError> {
    let id = match payload {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get(field).and_then(Value::as_str),
        _ => None,
    };
    id.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| GatewayError::Validation(format!("{field} is required")))
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T, GatewayError> {
    serde_json::from_value(payload)
        .map_err(|e| GatewayError::Validation(format!("Invalid payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_id_accepts_string_or_object() {
        assert_eq!(parse_id(&json!("a1"), "alertId"), Ok("a1".to_string()));
        assert_eq!(
            parse_id(&json!({"alertId": " a1 "}), "alertId"),
            Ok("a1".to_string())
        );
        assert!(parse_id(&json!(42), "alertId").is_err());
        assert!(parse_id(&json!(""), "alertId").is_err());
        assert!(parse_id(&Value::Null, "eventId").is_err());
    }
}
