//! Chat history and the REST fallback for sending event messages.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::models::message::{ChatMessage, ParentKind};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/alert-messages/{alert_id}", get(alert_history))
        .route(
            "/event-messages/{event_id}",
            get(event_history).post(send_event_message),
        )
}

// ---------------------------------------------------------------------------
// GET /api/alert-messages/{alert_id}
// GET /api/event-messages/{event_id}
// ---------------------------------------------------------------------------

async fn alert_history(
    user: AuthUser,
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    history(&state, &user, ParentKind::Alert, &alert_id).await
}

async fn event_history(
    user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    history(&state, &user, ParentKind::Event, &event_id).await
}

/// The newest `HISTORY_LIMIT` messages, oldest first, for callers allowed
/// to post in the thread.
async fn history(
    state: &AppState,
    user: &AuthUser,
    kind: ParentKind,
    parent_id: &str,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    state
        .gateway
        .relay(kind)
        .authorize(parent_id, user.author())
        .await?;

    let messages = state
        .store
        .list_messages(kind, parent_id, state.config.history_limit)
        .await?;

    Ok(Json(messages))
}

// ---------------------------------------------------------------------------
// POST /api/event-messages/{event_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

async fn send_event_message(
    user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = state
        .gateway
        .relay(ParentKind::Event)
        .send(
            &event_id,
            user.author(),
            &body.message,
            body.timestamp.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
