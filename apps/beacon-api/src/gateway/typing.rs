//! Typing indicators. The server keeps no typing state: clients drop an
//! indicator 2 s after the last signal they received.

use std::sync::Arc;

use serde_json::json;

use super::error::{GatewayError, ACCESS_DENIED};
use super::events::{EventName, Outbound};
use super::registry::RoomRegistry;
use super::rooms::Room;

#[derive(Clone)]
pub struct TypingRelay {
    registry: Arc<RoomRegistry>,
}

impl TypingRelay {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Relay a typing signal from `session_id` to the rest of `room`.
    /// Only members of the room may signal.
    pub fn signal(&self, room: &Room, session_id: &str) -> Result<usize, GatewayError> {
        self.registry.transact(|table| {
            if !table.is_member(room, session_id) {
                return Err(GatewayError::Forbidden(ACCESS_DENIED));
            }
            let session = table.session(session_id).ok_or(GatewayError::UnknownSession)?;
            let message = match room {
                Room::Alert(alert_id) => Outbound::new(
                    EventName::ALERT_USER_TYPING,
                    json!({
                        "alertId": alert_id,
                        "userId": session.user_id,
                        "username": session.username,
                    }),
                ),
                Room::Event(event_id) => Outbound::new(
                    EventName::USER_TYPING,
                    json!({
                        "userId": session.user_id,
                        "username": session.username,
                        "eventId": event_id,
                    }),
                ),
                Room::Community(_) => return Err(GatewayError::Forbidden(ACCESS_DENIED)),
            };
            Ok(table.broadcast(room, &message, Some(session_id)))
        })
    }
}
