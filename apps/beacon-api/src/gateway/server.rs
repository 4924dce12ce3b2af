//! Socket.IO transport: handshake authentication, event forwarding and the
//! per-connection writer task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use socketioxide::extract::{SocketRef, TryData};
use socketioxide::handler::ConnectHandler;
use socketioxide::layer::SocketIoLayer;
use socketioxide::socket::DisconnectReason;
use socketioxide::SocketIo;
use tokio::sync::mpsc;

use crate::auth::{AuthError, Identity};

use super::events::{ClientEvent, Outbound};
use super::handler::Gateway;

/// Client events forwarded to [`Gateway::dispatch`].
const FORWARDED_EVENTS: [&str; 9] = [
    ClientEvent::JOIN_COMMUNITY,
    ClientEvent::JOIN_EVENT,
    ClientEvent::LEAVE_EVENT,
    ClientEvent::JOIN_ALERT,
    ClientEvent::LEAVE_ALERT,
    ClientEvent::SEND_EVENT_MESSAGE,
    ClientEvent::SEND_ALERT_MESSAGE,
    ClientEvent::USER_TYPING,
    ClientEvent::ALERT_USER_TYPING,
];

/// Identities verified by the connect middleware, waiting for the connect
/// handler to pick them up. Entries nobody claims within the handshake
/// timeout are purged on the next insert.
struct Pending {
    entries: DashMap<String, (Identity, Instant)>,
    ttl: Duration,
}

impl Pending {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    fn insert(&self, socket_id: String, identity: Identity) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, at)| at.elapsed() < ttl);
        self.entries.insert(socket_id, (identity, Instant::now()));
    }

    fn take(&self, socket_id: &str) -> Option<Identity> {
        self.entries
            .remove(socket_id)
            .map(|(_, (identity, _))| identity)
    }
}

/// Build the Socket.IO layer and register the default namespace.
pub fn layer(gateway: Arc<Gateway>, handshake_timeout: Duration) -> (SocketIoLayer, SocketIo) {
    let (layer, io) = SocketIo::builder()
        .connect_timeout(handshake_timeout)
        .build_layer();

    let pending = Arc::new(Pending::new(handshake_timeout));

    let authenticate = {
        let gateway = gateway.clone();
        let pending = pending.clone();
        move |s: SocketRef, TryData(auth): TryData<Value>| {
            let gateway = gateway.clone();
            let pending = pending.clone();
            async move {
                let token = auth
                    .ok()
                    .and_then(|a| a.get("token").and_then(Value::as_str).map(String::from));
                match gateway.authenticate(token.as_deref()).await {
                    Ok(identity) => {
                        pending.insert(s.id.to_string(), identity);
                        Ok(())
                    }
                    Err(e) => {
                        tracing::info!(sid = %s.id, error = %e, "handshake rejected");
                        Err::<(), AuthError>(e)
                    }
                }
            }
        }
    };

    let on_connect = move |s: SocketRef| {
        let gateway = gateway.clone();
        let pending = pending.clone();
        async move { admit(s, gateway, pending) }
    };

    io.ns("/", on_connect.with(authenticate));

    (layer, io)
}

fn admit(s: SocketRef, gateway: Arc<Gateway>, pending: Arc<Pending>) {
    let session_id = s.id.to_string();
    let Some(identity) = pending.take(&session_id) else {
        tracing::warn!(session_id, "connected without a verified identity");
        s.disconnect().ok();
        return;
    };

    let (tx, rx) = mpsc::unbounded_channel();
    gateway.connect(session_id.clone(), identity, tx);
    tokio::spawn(forward_outbox(s.clone(), rx));

    for event in FORWARDED_EVENTS {
        let gateway = gateway.clone();
        let session_id = session_id.clone();
        s.on(event, move |TryData(payload): TryData<Value>| {
            let gateway = gateway.clone();
            let session_id = session_id.clone();
            async move {
                let payload = payload.unwrap_or(Value::Null);
                // Errors were already reported to the client.
                let _ = gateway.dispatch(&session_id, event, payload).await;
            }
        });
    }

    s.on_disconnect(move |reason: DisconnectReason| {
        let gateway = gateway.clone();
        let session_id = session_id.clone();
        async move {
            tracing::debug!(session_id, ?reason, "transport closed");
            gateway.disconnect(&session_id);
        }
    });
}

/// Drain a session's outbox onto the socket. Ends when the session is
/// dropped by the gateway.
async fn forward_outbox(socket: SocketRef, mut outbox: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(message) = outbox.recv().await {
        if let Err(e) = socket.emit(message.event.clone(), &*message.data) {
            tracing::debug!(sid = %socket.id, event = %message.event, ?e, "emit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> Identity {
        Identity {
            user_id: format!("id-{name}"),
            username: name.into(),
            community: "oak".into(),
        }
    }

    #[test]
    fn pending_identity_is_taken_once() {
        let pending = Pending::new(Duration::from_secs(10));
        pending.insert("s1".into(), identity("ana"));

        assert_eq!(pending.take("s1"), Some(identity("ana")));
        assert_eq!(pending.take("s1"), None);
    }

    #[test]
    fn unclaimed_identities_expire() {
        let pending = Pending::new(Duration::ZERO);
        pending.insert("s1".into(), identity("ana"));
        pending.insert("s2".into(), identity("ben"));

        assert_eq!(pending.take("s1"), None);
        assert_eq!(pending.take("s2"), Some(identity("ben")));
        assert!(pending.entries.is_empty());
    }
}
