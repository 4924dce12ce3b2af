//! Room registry: which sessions are in which rooms.
//!
//! All membership state lives in one table behind one `parking_lot::Mutex`,
//! so a join, its presence announcement and any concurrent broadcast are
//! totally ordered. Delivery is a non-blocking push onto each member's
//! outbox, which keeps the critical section free of I/O.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::events::Outbound;
use super::rooms::Room;
use super::session::Session;

/// Transition of a username's presence in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    /// First session of this username entered the room.
    Arrived,
    /// Last session of this username left the room.
    Departed,
}

#[derive(Default)]
pub struct RoomTable {
    rooms: HashMap<Room, HashSet<String>>,
    sessions: HashMap<String, Arc<Session>>,
    joined: HashMap<String, HashSet<Room>>,
}

impl RoomTable {
    pub fn session(&self, session_id: &str) -> Option<&Arc<Session>> {
        self.sessions.get(session_id)
    }

    /// Add a session to a room, creating the room if needed. Joining twice
    /// is a no-op. Sessions not attached to the registry are ignored.
    pub fn join(&mut self, room: &Room, session_id: &str) -> Option<PresenceChange> {
        let username = self.sessions.get(session_id)?.username.clone();
        let already_present = self.has_username(room, &username);

        let members = self.rooms.entry(room.clone()).or_default();
        if !members.insert(session_id.to_string()) {
            return None;
        }
        self.joined
            .entry(session_id.to_string())
            .or_default()
            .insert(room.clone());

        (!already_present).then_some(PresenceChange::Arrived)
    }

    /// Remove a session from a room, dropping the room once it is empty.
    /// Leaving a room the session is not in is a no-op.
    pub fn leave(&mut self, room: &Room, session_id: &str) -> Option<PresenceChange> {
        let members = self.rooms.get_mut(room)?;
        if !members.remove(session_id) {
            return None;
        }
        if members.is_empty() {
            self.rooms.remove(room);
        }
        if let Some(rooms) = self.joined.get_mut(session_id) {
            rooms.remove(room);
        }

        let username = &self.sessions.get(session_id)?.username;
        (!self.has_username(room, username)).then_some(PresenceChange::Departed)
    }

    /// Deliver to every current member except `exclude`. Returns how many
    /// outboxes accepted the event.
    pub fn broadcast(&self, room: &Room, message: &Outbound, exclude: Option<&str>) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter(|sid| Some(sid.as_str()) != exclude)
            .filter_map(|sid| self.sessions.get(sid))
            .filter(|session| session.send(message.clone()))
            .count()
    }

    pub fn is_member(&self, room: &Room, session_id: &str) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(session_id))
    }

    pub fn members_of(&self, room: &Room) -> Vec<String> {
        let mut members: Vec<String> = self
            .rooms
            .get(room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn rooms_of(&self, session_id: &str) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .joined
            .get(session_id)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Distinct usernames with at least one session in the room.
    pub fn presence(&self, room: &Room) -> BTreeSet<String> {
        self.rooms
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|sid| self.sessions.get(sid))
                    .map(|s| s.username.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Forget a session. Memberships still held are dropped silently, so
    /// callers leave through the presence tracker first. Later joins for the
    /// session are ignored.
    pub fn remove_session(&mut self, session_id: &str) -> Option<Arc<Session>> {
        for room in self.rooms_of(session_id) {
            self.leave(&room, session_id);
        }
        self.joined.remove(session_id);
        self.sessions.remove(session_id)
    }

    fn has_username(&self, room: &Room, username: &str) -> bool {
        self.rooms.get(room).is_some_and(|members| {
            members
                .iter()
                .filter_map(|sid| self.sessions.get(sid))
                .any(|s| s.username == username)
        })
    }
}

/// Shared, process-wide room registry.
#[derive(Default)]
pub struct RoomRegistry {
    table: Mutex<RoomTable>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the room table.
    pub fn transact<R>(&self, f: impl FnOnce(&mut RoomTable) -> R) -> R {
        f(&mut self.table.lock())
    }

    /// Make a session addressable. Must precede any join.
    pub fn attach(&self, session: Arc<Session>) {
        let mut table = self.table.lock();
        table.joined.entry(session.session_id.clone()).or_default();
        table.sessions.insert(session.session_id.clone(), session);
    }

    pub fn join(&self, room: &Room, session_id: &str) -> Option<PresenceChange> {
        self.table.lock().join(room, session_id)
    }

    pub fn leave(&self, room: &Room, session_id: &str) -> Option<PresenceChange> {
        self.table.lock().leave(room, session_id)
    }

    pub fn broadcast(&self, room: &Room, message: Outbound, exclude: Option<&str>) -> usize {
        self.table.lock().broadcast(room, &message, exclude)
    }

    pub fn members_of(&self, room: &Room) -> Vec<String> {
        self.table.lock().members_of(room)
    }

    pub fn is_member(&self, room: &Room, session_id: &str) -> bool {
        self.table.lock().is_member(room, session_id)
    }

    pub fn rooms_of(&self, session_id: &str) -> Vec<Room> {
        self.table.lock().rooms_of(session_id)
    }

    pub fn presence(&self, room: &Room) -> BTreeSet<String> {
        self.table.lock().presence(room)
    }

    pub fn room_count(&self) -> usize {
        self.table.lock().room_count()
    }
}
