//! Presence announcements layered on the room registry.
//!
//! Presence is per **username**, not per session: a user with several tabs
//! open shows up once, arrives with the first tab and leaves with the last.
//! Announcements are pushed while the room table lock is still held, so two
//! announcements for the same user and room can never be reordered.

use std::sync::Arc;

use beacon_common::time::now_iso;

use super::events::{Outbound, PresencePayload};
use super::registry::{PresenceChange, RoomRegistry, RoomTable};
use super::rooms::Room;

#[derive(Clone)]
pub struct PresenceTracker {
    registry: Arc<RoomRegistry>,
}

impl PresenceTracker {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Join `room` and tell the rest of the room if this username just
    /// arrived. Returns the presence transition, if any.
    pub fn join(&self, room: &Room, session_id: &str) -> Option<PresenceChange> {
        self.registry.transact(|table| {
            let change = table.join(room, session_id);
            if change == Some(PresenceChange::Arrived) {
                announce(table, room, session_id, PresenceChange::Arrived);
            }
            change
        })
    }

    /// Leave `room` and announce the departure when the username's last
    /// session is gone.
    pub fn leave(&self, room: &Room, session_id: &str) -> Option<PresenceChange> {
        self.registry.transact(|table| {
            let change = table.leave(room, session_id);
            if change == Some(PresenceChange::Departed) {
                announce(table, room, session_id, PresenceChange::Departed);
            }
            change
        })
    }

    /// Leave every joined room with announcements, then forget the session.
    /// Both happen under one lock, so a join still in flight for this session
    /// finds it gone instead of announcing an arrival nobody will undo.
    /// Returns the rooms the session was in.
    pub fn depart(&self, session_id: &str) -> Vec<Room> {
        self.registry.transact(|table| {
            let rooms = table.rooms_of(session_id);
            for room in &rooms {
                if table.leave(room, session_id) == Some(PresenceChange::Departed) {
                    announce(table, room, session_id, PresenceChange::Departed);
                }
            }
            table.remove_session(session_id);
            rooms
        })
    }

    /// Sorted usernames currently in `room`.
    pub fn online(&self, room: &Room) -> Vec<String> {
        self.registry.presence(room).into_iter().collect()
    }
}

fn announce(table: &RoomTable, room: &Room, session_id: &str, change: PresenceChange) {
    let Some((joined, left)) = room.presence_events() else {
        return;
    };
    let Some(session) = table.session(session_id) else {
        return;
    };
    let event = match change {
        PresenceChange::Arrived => joined,
        PresenceChange::Departed => left,
    };
    let payload = PresencePayload {
        user_id: &session.user_id,
        username: &session.username,
        timestamp: now_iso(),
    };
    let data = match serde_json::to_value(&payload) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(?e, %room, event, "failed to serialize presence payload");
            return;
        }
    };
    let delivered = table.broadcast(room, &Outbound::new(event, data), Some(session_id));
    tracing::debug!(%room, session_id, event, delivered, "presence announced");
}
