//! Room occupancy lookups.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::gateway::Room;
use crate::models::message::ParentKind;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/alerts/{alert_id}/presence", get(alert_presence))
        .route("/events/{event_id}/presence", get(event_presence))
}

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub room: String,
    pub online: Vec<String>,
    pub count: usize,
}

async fn alert_presence(
    user: AuthUser,
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> Result<Json<PresenceResponse>, ApiError> {
    presence(&state, &user, ParentKind::Alert, &alert_id).await
}

async fn event_presence(
    user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<PresenceResponse>, ApiError> {
    presence(&state, &user, ParentKind::Event, &event_id).await
}

async fn presence(
    state: &AppState,
    user: &AuthUser,
    kind: ParentKind,
    parent_id: &str,
) -> Result<Json<PresenceResponse>, ApiError> {
    state
        .gateway
        .relay(kind)
        .authorize(parent_id, user.author())
        .await?;

    let room = Room::for_parent(kind, parent_id);
    let online = state.gateway.online(&room);
    Ok(Json(PresenceResponse {
        room: room.to_string(),
        count: online.len(),
        online,
    }))
}
