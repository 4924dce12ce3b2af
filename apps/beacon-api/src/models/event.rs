use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use thiserror::Error;

use beacon_common::id::{prefix, prefixed_ulid};

use crate::db::schema::events;

/// Default attendee cap for new events.
pub const DEFAULT_MAX_ATTENDEES: i32 = 50;

/// A row of the `events` table, without its attendee list.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = events)]
pub struct EventRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub created_by: String,
    pub community: String,
    pub max_attendees: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A community event together with the ids of its attendees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub created_by: String,
    pub attendees: Vec<String>,
    pub community: String,
    pub max_attendees: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a user could not be added to an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    #[error("Already joined this event")]
    AlreadyAttending,
    #[error("Event is full")]
    Full,
}

impl EventRecord {
    /// Build a fresh event. The creator is its first attendee.
    pub fn new(title: &str, created_by: &str, community: &str, max_attendees: i32) -> Self {
        let now = Utc::now();
        Self {
            id: prefixed_ulid(prefix::EVENT),
            title: title.to_string(),
            description: String::new(),
            date: now,
            location: String::new(),
            category: "other".to_string(),
            created_by: created_by.to_string(),
            attendees: vec![created_by.to_string()],
            community: community.to_string(),
            max_attendees,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_row(row: EventRow, attendees: Vec<String>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            date: row.date,
            location: row.location,
            category: row.category,
            created_by: row.created_by,
            attendees,
            community: row.community,
            max_attendees: row.max_attendees,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub fn is_attending(&self, user_id: &str) -> bool {
        self.attendees.iter().any(|a| a == user_id)
    }

    /// Add an attendee, enforcing uniqueness and the attendee cap.
    pub fn add_attendee(&mut self, user_id: &str) -> Result<(), AttendanceError> {
        if self.is_attending(user_id) {
            return Err(AttendanceError::AlreadyAttending);
        }
        if self.attendees.len() >= self.max_attendees.max(0) as usize {
            return Err(AttendanceError::Full);
        }
        self.attendees.push(user_id.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }
}
