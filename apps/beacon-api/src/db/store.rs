use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use beacon_common::id::{prefix, prefixed_ulid};

use crate::models::alert::AlertRecord;
use crate::models::event::{AttendanceError, EventRecord};
use crate::models::message::{ChatMessage, NewChatMessage, ParentKind};
use crate::models::user::UserRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("store unavailable")]
    Unavailable,
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for StoreError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        StoreError::Pool(err.to_string())
    }
}

/// Persistence the realtime core depends on.
///
/// Users, alerts and events are owned by the surrounding REST application;
/// the core only reads them. Chat messages are appended here.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn find_alert(&self, alert_id: &str) -> Result<Option<AlertRecord>, StoreError>;
    async fn find_event(&self, event_id: &str) -> Result<Option<EventRecord>, StoreError>;
    async fn create_message(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError>;
    /// The newest `limit` messages of a thread, oldest first.
    async fn list_messages(
        &self,
        kind: ParentKind,
        parent_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation (local runs without DATABASE_URL, and tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    alerts: HashMap<String, AlertRecord>,
    events: HashMap<String, EventRecord>,
    messages: Vec<ChatMessage>,
    fail_writes: bool,
    write_delay: Option<Duration>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.tables.lock().users.insert(user.id.clone(), user);
    }

    pub fn insert_alert(&self, alert: AlertRecord) {
        self.tables.lock().alerts.insert(alert.id.clone(), alert);
    }

    pub fn insert_event(&self, event: EventRecord) {
        self.tables.lock().events.insert(event.id.clone(), event);
    }

    /// Add `user_id` to an event's attendees. Returns `Ok(false)` when the
    /// event does not exist.
    pub fn join_event(&self, event_id: &str, user_id: &str) -> Result<bool, AttendanceError> {
        let mut tables = self.tables.lock();
        match tables.events.get_mut(event_id) {
            Some(event) => event.add_attendee(user_id).map(|_| true),
            None => Ok(false),
        }
    }

    /// Make every subsequent message write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.tables.lock().fail_writes = fail;
    }

    /// Stall every subsequent message write by `delay`.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        self.tables.lock().write_delay = delay;
    }

    pub fn message_count(&self) -> usize {
        self.tables.lock().messages.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables.lock().users.get(user_id).cloned())
    }

    async fn find_alert(&self, alert_id: &str) -> Result<Option<AlertRecord>, StoreError> {
        Ok(self.tables.lock().alerts.get(alert_id).cloned())
    }

    async fn find_event(&self, event_id: &str) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.tables.lock().events.get(event_id).cloned())
    }

    async fn create_message(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
        let delay = self.tables.lock().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut tables = self.tables.lock();
        if tables.fail_writes {
            return Err(StoreError::Unavailable);
        }
        let stored = ChatMessage {
            id: prefixed_ulid(prefix::MESSAGE),
            kind: message.kind,
            parent_id: message.parent_id,
            user_id: message.user_id,
            username: message.username,
            message: message.message,
            timestamp: message.timestamp,
        };
        tables.messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_messages(
        &self,
        kind: ParentKind,
        parent_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let tables = self.tables.lock();
        let mut thread: Vec<ChatMessage> = tables
            .messages
            .iter()
            .filter(|m| m.kind == kind && m.parent_id == parent_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        thread.sort_by_key(|m| m.timestamp);
        let skip = thread.len().saturating_sub(limit.max(0) as usize);
        Ok(thread.split_off(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn new_message(kind: ParentKind, parent: &str, text: &str, minute: u32) -> NewChatMessage {
        NewChatMessage {
            kind,
            parent_id: parent.into(),
            user_id: "u1".into(),
            username: "ana".into(),
            message: text.into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_keeps_fields() {
        let store = MemoryStore::new();
        let saved = store
            .create_message(new_message(ParentKind::Alert, "a1", "hi", 0))
            .await
            .unwrap();
        assert!(saved.id.starts_with("msg_"));
        assert_eq!(saved.parent_id, "a1");
        assert_eq!(saved.message, "hi");
        assert_eq!(store.message_count(), 1);
    }

    #[tokio::test]
    async fn list_returns_latest_in_ascending_order() {
        let store = MemoryStore::new();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            store
                .create_message(new_message(ParentKind::Event, "e1", text, i as u32))
                .await
                .unwrap();
        }
        store
            .create_message(new_message(ParentKind::Alert, "e1", "other thread", 9))
            .await
            .unwrap();

        let latest = store.list_messages(ParentKind::Event, "e1", 2).await.unwrap();
        let texts: Vec<_> = latest.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);
        assert!(latest[0].timestamp < latest[1].timestamp);
    }

    #[tokio::test]
    async fn failing_writes_surface_as_errors() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let result = store
            .create_message(new_message(ParentKind::Alert, "a1", "hi", 0))
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable)));
        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn join_event_enforces_attendance_rules() {
        let store = MemoryStore::new();
        let event = EventRecord::new("Cleanup", "u1", "oak", 2);
        let id = event.id.clone();
        store.insert_event(event);

        assert_eq!(store.join_event(&id, "u2"), Ok(true));
        assert_eq!(store.join_event(&id, "u3"), Err(AttendanceError::Full));
        assert_eq!(store.join_event("missing", "u3"), Ok(false));

        let stored = store.find_event(&id).await.unwrap().unwrap();
        assert!(stored.is_attending("u2"));
    }
}
