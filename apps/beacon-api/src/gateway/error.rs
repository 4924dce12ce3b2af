use thiserror::Error;

/// Failures of a gateway operation. `Display` is the reason sent to the
/// requester in the `{error}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{0}")]
    ParentNotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("Failed to send message")]
    PersistFailed,
    /// A lookup outside the send path failed.
    #[error("Internal server error")]
    Internal,
    #[error("Session not found")]
    UnknownSession,
}

pub const ALERT_NOT_FOUND: &str = "Alert not found";
pub const EVENT_NOT_FOUND: &str = "Event not found";
pub const ACCESS_DENIED: &str = "Access denied";
pub const NOT_ATTENDING: &str = "You must be attending the event to send messages";
