use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::ser::{Serialize, SerializeMap, Serializer};

use beacon_common::time::iso_millis;

use crate::db::schema::{alert_messages, event_messages};

/// Which kind of record a chat thread hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentKind {
    Alert,
    Event,
}

impl ParentKind {
    /// Wire field carrying the parent id (`alertId` / `eventId`).
    pub fn id_field(self) -> &'static str {
        match self {
            ParentKind::Alert => "alertId",
            ParentKind::Event => "eventId",
        }
    }
}

/// A persisted chat message, as broadcast and as returned by history.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub kind: ParentKind,
    pub parent_id: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Serialize for ChatMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("_id", &self.id)?;
        map.serialize_entry(self.kind.id_field(), &self.parent_id)?;
        map.serialize_entry("userId", &self.user_id)?;
        map.serialize_entry("username", &self.username)?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry("timestamp", &iso_millis(self.timestamp))?;
        map.end()
    }
}

/// A message that has passed validation and authorization but has not been
/// written yet.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub kind: ParentKind,
    pub parent_id: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = alert_messages)]
pub struct AlertMessageRow {
    pub id: String,
    pub alert_id: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<AlertMessageRow> for ChatMessage {
    fn from(row: AlertMessageRow) -> Self {
        Self {
            id: row.id,
            kind: ParentKind::Alert,
            parent_id: row.alert_id,
            user_id: row.user_id,
            username: row.username,
            message: row.message,
            timestamp: row.timestamp,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = event_messages)]
pub struct EventMessageRow {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<EventMessageRow> for ChatMessage {
    fn from(row: EventMessageRow) -> Self {
        Self {
            id: row.id,
            kind: ParentKind::Event,
            parent_id: row.event_id,
            user_id: row.user_id,
            username: row.username,
            message: row.message,
            timestamp: row.timestamp,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = alert_messages)]
pub struct NewAlertMessage<'a> {
    pub id: &'a str,
    pub alert_id: &'a str,
    pub user_id: &'a str,
    pub username: &'a str,
    pub message: &'a str,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = event_messages)]
pub struct NewEventMessage<'a> {
    pub id: &'a str,
    pub event_id: &'a str,
    pub user_id: &'a str,
    pub username: &'a str,
    pub message: &'a str,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
