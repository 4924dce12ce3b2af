use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use beacon_common::id::{prefix, prefixed_ulid};

use crate::db::schema::alerts;

/// A safety alert posted to a community. Read-only to the realtime core.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = alerts)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub severity: String,
    pub location: String,
    pub status: String,
    pub created_by: String,
    pub community: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRecord {
    /// Build a fresh alert with the column defaults (`other`, `medium`,
    /// `active`).
    pub fn new(title: &str, created_by: &str, community: &str) -> Self {
        let now = Utc::now();
        Self {
            id: prefixed_ulid(prefix::ALERT),
            title: title.to_string(),
            description: String::new(),
            category: "other".to_string(),
            severity: "medium".to_string(),
            location: String::new(),
            status: "active".to_string(),
            created_by: created_by.to_string(),
            community: community.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
