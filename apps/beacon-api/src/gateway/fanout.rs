//! Community-wide notifications for domain changes.
//!
//! The CRUD layer calls these after it has committed a change; delivery is
//! scoped to `community:<name>` and never reaches another community.

use std::borrow::Cow;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::alert::AlertRecord;
use crate::models::event::EventRecord;

use super::events::{EventName, Outbound};
use super::registry::RoomRegistry;
use super::rooms::Room;

/// Cloneable handle; store in `AppState`.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RoomRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `event` to every session in the community room. Returns the
    /// number of sessions reached.
    pub fn notify_community(
        &self,
        community: &str,
        event: impl Into<Cow<'static, str>>,
        payload: Value,
    ) -> usize {
        let room = Room::Community(community.to_string());
        let message = Outbound::new(event, payload);
        let event = message.event.clone();
        let delivered = self.registry.broadcast(&room, message, None);
        tracing::debug!(%room, %event, delivered, "community notified");
        delivered
    }

    pub fn alert_created(&self, alert: &AlertRecord) -> usize {
        self.notify_serialized(&alert.community, EventName::ALERT_BROADCAST, alert)
    }

    pub fn alert_updated(&self, alert: &AlertRecord) -> usize {
        self.notify_serialized(&alert.community, EventName::ALERT_UPDATED, alert)
    }

    pub fn alert_deleted(&self, community: &str, alert_id: &str) -> usize {
        self.notify_community(community, EventName::ALERT_DELETED, json!(alert_id))
    }

    pub fn event_created(&self, event: &EventRecord) -> usize {
        self.notify_serialized(&event.community, EventName::EVENT_BROADCAST, event)
    }

    pub fn event_joined(&self, event: &EventRecord, user_id: &str, username: &str) -> usize {
        let payload = json!({
            "event": event,
            "user": { "_id": user_id, "username": username },
        });
        self.notify_community(&event.community, EventName::EVENT_JOINED, payload)
    }

    fn notify_serialized<T: Serialize>(
        &self,
        community: &str,
        event: &'static str,
        record: &T,
    ) -> usize {
        match serde_json::to_value(record) {
            Ok(payload) => self.notify_community(community, event, payload),
            Err(e) => {
                tracing::error!(?e, event, "failed to serialize notification");
                0
            }
        }
    }
}
