//! Socket.IO event names and wire payloads.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Event names the server listens for.
pub struct ClientEvent;

impl ClientEvent {
    pub const JOIN_COMMUNITY: &'static str = "join_community";
    pub const JOIN_EVENT: &'static str = "join_event";
    pub const LEAVE_EVENT: &'static str = "leave_event";
    pub const JOIN_ALERT: &'static str = "join_alert";
    pub const LEAVE_ALERT: &'static str = "leave_alert";
    pub const SEND_EVENT_MESSAGE: &'static str = "send_event_message";
    pub const SEND_ALERT_MESSAGE: &'static str = "send_alert_message";
    pub const USER_TYPING: &'static str = "user_typing";
    pub const ALERT_USER_TYPING: &'static str = "alert_user_typing";
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAlertMessage {
    pub alert_id: String,
    pub message: String,
    /// Client clock, RFC 3339. Unparseable values fall back to server time.
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEventMessage {
    pub event_id: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTyping {
    pub alert_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTyping {
    pub event_id: String,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Event names emitted to clients.
pub struct EventName;

impl EventName {
    pub const USER_JOINED: &'static str = "user_joined";
    pub const USER_LEFT: &'static str = "user_left";
    pub const ALERT_USER_JOINED: &'static str = "alert_user_joined";
    pub const ALERT_USER_LEFT: &'static str = "alert_user_left";
    pub const NEW_EVENT_MESSAGE: &'static str = "new_event_message";
    pub const NEW_ALERT_MESSAGE: &'static str = "new_alert_message";
    pub const USER_TYPING: &'static str = "user_typing";
    pub const ALERT_USER_TYPING: &'static str = "alert_user_typing";
    pub const MESSAGE_ERROR: &'static str = "message_error";
    pub const ALERT_MESSAGE_ERROR: &'static str = "alert_message_error";
    pub const ALERT_ERROR: &'static str = "alert_error";
    pub const ALERT_BROADCAST: &'static str = "alert_broadcast";
    pub const ALERT_UPDATED: &'static str = "alert_updated";
    pub const ALERT_DELETED: &'static str = "alert_deleted";
    pub const EVENT_BROADCAST: &'static str = "event_broadcast";
    pub const EVENT_JOINED: &'static str = "event_joined";
}

/// Presence announcement body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload<'a> {
    pub user_id: &'a str,
    pub username: &'a str,
    pub timestamp: String,
}

/// Body of every requester-scoped error event.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// One event queued for delivery to a single session.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub event: Cow<'static, str>,
    pub data: Arc<Value>,
}

impl Outbound {
    pub fn new(event: impl Into<Cow<'static, str>>, data: Value) -> Self {
        Self {
            event: event.into(),
            data: Arc::new(data),
        }
    }
}
