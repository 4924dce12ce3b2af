//! Chat message relay: validate, look up, authorize, persist, broadcast.
//!
//! One implementation serves both alert and event rooms; the instance's
//! [`ParentKind`] selects the lookup, the authorization rule and the event
//! names.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::db::store::Store;
use crate::models::message::{ChatMessage, NewChatMessage, ParentKind};

use super::error::{
    GatewayError, ACCESS_DENIED, ALERT_NOT_FOUND, EVENT_NOT_FOUND, NOT_ATTENDING,
};
use super::events::{EventName, Outbound};
use super::registry::RoomRegistry;
use super::rooms::Room;

/// Maximum message length, counted in characters after trimming.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Who is sending. The community is only consulted for alert threads.
#[derive(Debug, Clone, Copy)]
pub struct Author<'a> {
    pub user_id: &'a str,
    pub username: &'a str,
    pub community: Option<&'a str>,
}

pub struct MessageRelay {
    kind: ParentKind,
    store: Arc<dyn Store>,
    registry: Arc<RoomRegistry>,
    persist_timeout: Duration,
    trust_client_timestamps: bool,
}

impl MessageRelay {
    pub fn new(
        kind: ParentKind,
        store: Arc<dyn Store>,
        registry: Arc<RoomRegistry>,
        persist_timeout: Duration,
        trust_client_timestamps: bool,
    ) -> Self {
        Self {
            kind,
            store,
            registry,
            persist_timeout,
            trust_client_timestamps,
        }
    }

    pub fn kind(&self) -> ParentKind {
        self.kind
    }

    /// Event name used to report a failed send back to the sender.
    pub fn error_event(&self) -> &'static str {
        match self.kind {
            ParentKind::Alert => EventName::ALERT_MESSAGE_ERROR,
            ParentKind::Event => EventName::MESSAGE_ERROR,
        }
    }

    fn broadcast_event(&self) -> &'static str {
        match self.kind {
            ParentKind::Alert => EventName::NEW_ALERT_MESSAGE,
            ParentKind::Event => EventName::NEW_EVENT_MESSAGE,
        }
    }

    /// Check that `author` may post in the thread of `parent_id`.
    pub async fn authorize(&self, parent_id: &str, author: Author<'_>) -> Result<(), GatewayError> {
        match self.kind {
            ParentKind::Alert => {
                let alert = self
                    .store
                    .find_alert(parent_id)
                    .await
                    .map_err(|e| lookup_failed(e, parent_id))?
                    .ok_or(GatewayError::ParentNotFound(ALERT_NOT_FOUND))?;
                if author.community != Some(alert.community.as_str()) {
                    return Err(GatewayError::Forbidden(ACCESS_DENIED));
                }
            }
            ParentKind::Event => {
                let event = self
                    .store
                    .find_event(parent_id)
                    .await
                    .map_err(|e| lookup_failed(e, parent_id))?
                    .ok_or(GatewayError::ParentNotFound(EVENT_NOT_FOUND))?;
                if !event.is_attending(author.user_id) {
                    return Err(GatewayError::Forbidden(NOT_ATTENDING));
                }
            }
        }
        Ok(())
    }

    /// Run the full send pipeline. The stored message is broadcast to the
    /// room, sender included, only after the write succeeded.
    pub async fn send(
        &self,
        parent_id: &str,
        author: Author<'_>,
        body: &str,
        client_timestamp: Option<&str>,
    ) -> Result<ChatMessage, GatewayError> {
        let body = validate_body(body)?;
        if parent_id.trim().is_empty() {
            return Err(GatewayError::Validation(format!(
                "{} is required",
                self.kind.id_field()
            )));
        }

        self.authorize(parent_id, author).await?;

        let new_message = NewChatMessage {
            kind: self.kind,
            parent_id: parent_id.to_string(),
            user_id: author.user_id.to_string(),
            username: author.username.to_string(),
            message: body.to_string(),
            timestamp: self.resolve_timestamp(client_timestamp),
        };

        let stored = match tokio::time::timeout(
            self.persist_timeout,
            self.store.create_message(new_message),
        )
        .await
        {
            Ok(Ok(stored)) => stored,
            Ok(Err(e)) => {
                tracing::error!(?e, parent_id, user_id = author.user_id, "message write failed");
                return Err(GatewayError::PersistFailed);
            }
            Err(_) => {
                tracing::error!(parent_id, user_id = author.user_id, "message write timed out");
                return Err(GatewayError::PersistFailed);
            }
        };

        let room = Room::for_parent(self.kind, parent_id);
        let data = serde_json::to_value(&stored).map_err(|e| {
            tracing::error!(?e, "failed to serialize chat message");
            GatewayError::PersistFailed
        })?;
        let delivered = self
            .registry
            .broadcast(&room, Outbound::new(self.broadcast_event(), data), None);
        tracing::info!(
            %room,
            message_id = %stored.id,
            user_id = author.user_id,
            delivered,
            "chat message relayed"
        );

        Ok(stored)
    }

    fn resolve_timestamp(&self, client_timestamp: Option<&str>) -> DateTime<Utc> {
        if !self.trust_client_timestamps {
            return Utc::now();
        }
        client_timestamp
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}

/// Trim and bound a message body.
pub fn validate_body(body: &str) -> Result<&str, GatewayError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::Validation("Message cannot be empty".into()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(GatewayError::Validation(format!(
            "Message must be {MAX_MESSAGE_CHARS} characters or fewer"
        )));
    }
    Ok(trimmed)
}

fn lookup_failed(err: crate::db::store::StoreError, parent_id: &str) -> GatewayError {
    tracing::error!(?err, parent_id, "parent lookup failed");
    GatewayError::Internal
}
