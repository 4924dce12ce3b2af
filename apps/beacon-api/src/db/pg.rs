use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use beacon_common::id::{prefix, prefixed_ulid};

use super::pool::DbPool;
use super::schema::{alert_messages, alerts, event_attendees, event_messages, events, users};
use super::store::{Store, StoreError};
use crate::models::alert::AlertRecord;
use crate::models::event::{EventRecord, EventRow};
use crate::models::message::{
    AlertMessageRow, ChatMessage, EventMessageRow, NewAlertMessage, NewChatMessage,
    NewEventMessage, ParentKind,
};
use crate::models::user::UserRecord;

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    statement_timeout: Option<Duration>,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Abort message INSERTs server-side after `timeout`, so a write that
    /// overran is rolled back.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }
}

/// `SET statement_timeout` for a pooled connection. The setting stays on the
/// connection, which is fine since every write applies it again.
fn statement_timeout_sql(timeout: Duration) -> String {
    format!("SET statement_timeout = {}", timeout.as_millis().max(1))
}

#[async_trait]
impl Store for PgStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut conn = self.pool.get().await?;
        let user = diesel_async::RunQueryDsl::get_result(
            users::table.find(user_id).select(UserRecord::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(user)
    }

    async fn find_alert(&self, alert_id: &str) -> Result<Option<AlertRecord>, StoreError> {
        let mut conn = self.pool.get().await?;
        let alert = diesel_async::RunQueryDsl::get_result(
            alerts::table.find(alert_id).select(AlertRecord::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(alert)
    }

    async fn find_event(&self, event_id: &str) -> Result<Option<EventRecord>, StoreError> {
        let mut conn = self.pool.get().await?;
        let row: Option<EventRow> = diesel_async::RunQueryDsl::get_result(
            events::table.find(event_id).select(EventRow::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };

        let attendees: Vec<String> = diesel_async::RunQueryDsl::load(
            event_attendees::table
                .filter(event_attendees::event_id.eq(event_id))
                .order(event_attendees::joined_at.asc())
                .select(event_attendees::user_id),
            &mut conn,
        )
        .await?;

        Ok(Some(EventRecord::from_row(row, attendees)))
    }

    async fn create_message(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
        let mut conn = self.pool.get().await?;
        if let Some(timeout) = self.statement_timeout {
            diesel_async::RunQueryDsl::execute(
                diesel::sql_query(statement_timeout_sql(timeout)),
                &mut conn,
            )
            .await?;
        }
        let id = prefixed_ulid(prefix::MESSAGE);
        let now = Utc::now();

        match message.kind {
            ParentKind::Alert => {
                diesel_async::RunQueryDsl::execute(
                    diesel::insert_into(alert_messages::table).values(NewAlertMessage {
                        id: &id,
                        alert_id: &message.parent_id,
                        user_id: &message.user_id,
                        username: &message.username,
                        message: &message.message,
                        timestamp: message.timestamp,
                        created_at: now,
                    }),
                    &mut conn,
                )
                .await?;
            }
            ParentKind::Event => {
                diesel_async::RunQueryDsl::execute(
                    diesel::insert_into(event_messages::table).values(NewEventMessage {
                        id: &id,
                        event_id: &message.parent_id,
                        user_id: &message.user_id,
                        username: &message.username,
                        message: &message.message,
                        timestamp: message.timestamp,
                        created_at: now,
                    }),
                    &mut conn,
                )
                .await?;
            }
        }

        Ok(ChatMessage {
            id,
            kind: message.kind,
            parent_id: message.parent_id,
            user_id: message.user_id,
            username: message.username,
            message: message.message,
            timestamp: message.timestamp,
        })
    }

    async fn list_messages(
        &self,
        kind: ParentKind,
        parent_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let mut conn = self.pool.get().await?;

        // Newest first from the database, flipped to reading order below.
        let mut thread: Vec<ChatMessage> = match kind {
            ParentKind::Alert => {
                let rows: Vec<AlertMessageRow> = diesel_async::RunQueryDsl::load(
                    alert_messages::table
                        .filter(alert_messages::alert_id.eq(parent_id))
                        .order((alert_messages::timestamp.desc(), alert_messages::id.desc()))
                        .limit(limit)
                        .select(AlertMessageRow::as_select()),
                    &mut conn,
                )
                .await?;
                rows.into_iter().map(ChatMessage::from).collect()
            }
            ParentKind::Event => {
                let rows: Vec<EventMessageRow> = diesel_async::RunQueryDsl::load(
                    event_messages::table
                        .filter(event_messages::event_id.eq(parent_id))
                        .order((event_messages::timestamp.desc(), event_messages::id.desc()))
                        .limit(limit)
                        .select(EventMessageRow::as_select()),
                    &mut conn,
                )
                .await?;
                rows.into_iter().map(ChatMessage::from).collect()
            }
        };

        thread.reverse();
        Ok(thread)
    }
}
