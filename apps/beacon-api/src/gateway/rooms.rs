//! Room keys.

use std::fmt;

use crate::models::message::ParentKind;

use super::events::EventName;

/// A broadcast scope. Rendered on the wire and in logs as
/// `community:<name>`, `alert:<id>` or `event:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {
    Community(String),
    Alert(String),
    Event(String),
}

impl Room {
    pub fn for_parent(kind: ParentKind, id: &str) -> Self {
        match kind {
            ParentKind::Alert => Room::Alert(id.to_string()),
            ParentKind::Event => Room::Event(id.to_string()),
        }
    }

    /// `(joined, left)` announcement names, or `None` for rooms that carry
    /// no presence traffic.
    pub fn presence_events(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Room::Community(_) => None,
            Room::Alert(_) => Some((EventName::ALERT_USER_JOINED, EventName::ALERT_USER_LEFT)),
            Room::Event(_) => Some((EventName::USER_JOINED, EventName::USER_LEFT)),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Community(name) => write!(f, "community:{name}"),
            Room::Alert(id) => write!(f, "alert:{id}"),
            Room::Event(id) => write!(f, "event:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_prefixed_keys() {
        assert_eq!(Room::Community("oak".into()).to_string(), "community:oak");
        assert_eq!(Room::Alert("a1".into()).to_string(), "alert:a1");
        assert_eq!(Room::for_parent(ParentKind::Event, "e1").to_string(), "event:e1");
    }

    #[test]
    fn community_rooms_have_no_presence_events() {
        assert!(Room::Community("oak".into()).presence_events().is_none());
        assert_eq!(
            Room::Alert("a1".into()).presence_events(),
            Some(("alert_user_joined", "alert_user_left"))
        );
        assert_eq!(
            Room::Event("e1".into()).presence_events(),
            Some(("user_joined", "user_left"))
        );
    }
}
