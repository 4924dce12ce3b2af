#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::Value;
use tokio::sync::mpsc;

use beacon_api::auth::verifier::Claims;
use beacon_api::config::Config;
use beacon_api::db::store::MemoryStore;
use beacon_api::gateway::events::Outbound;
use beacon_api::models::alert::AlertRecord;
use beacon_api::models::event::EventRecord;
use beacon_api::models::user::UserRecord;
use beacon_api::AppState;

pub const TEST_SECRET: &str = "beacon-test-secret";

/// Config used by every integration test: short write timeout, defaults
/// otherwise.
pub fn test_config() -> Config {
    let mut config = Config::new(TEST_SECRET);
    config.persist_timeout = Duration::from_millis(250);
    config.handshake_timeout = Duration::from_secs(2);
    config
}

/// Build an AppState over a fresh in-memory store.
pub fn test_state() -> (AppState, Arc<MemoryStore>) {
    test_state_with(test_config())
}

pub fn test_state_with(config: Config) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, store.clone());
    (state, store)
}

pub fn seed_user(store: &MemoryStore, username: &str, community: &str) -> UserRecord {
    let user = UserRecord {
        id: beacon_common::id::prefixed_ulid(beacon_common::id::prefix::USER),
        username: username.to_string(),
        community: community.to_string(),
    };
    store.insert_user(user.clone());
    user
}

pub fn seed_alert(store: &MemoryStore, author: &UserRecord, community: &str) -> AlertRecord {
    let alert = AlertRecord::new("Downed power line", &author.id, community);
    store.insert_alert(alert.clone());
    alert
}

pub fn seed_event(store: &MemoryStore, creator: &UserRecord, max_attendees: i32) -> EventRecord {
    let event = EventRecord::new("Street cleanup", &creator.id, &creator.community, max_attendees);
    store.insert_event(event.clone());
    event
}

/// Mint a login token the way the REST layer does.
pub fn mint_token(user_id: &str) -> String {
    mint_token_expiring(user_id, 3600)
}

pub fn mint_token_expiring(user_id: &str, seconds_from_now: i64) -> String {
    let claims = Claims {
        user_id: user_id.to_string(),
        exp: chrono::Utc::now().timestamp() + seconds_from_now,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("mint test token")
}

/// A connected session as seen by the test: its id and the events the
/// gateway queued for it.
pub struct TestClient {
    pub session_id: String,
    pub user: UserRecord,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl TestClient {
    /// Everything delivered so far, in order.
    pub fn drain(&mut self) -> Vec<(String, Value)> {
        let mut events = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            events.push((message.event.to_string(), (*message.data).clone()));
        }
        events
    }

    pub fn drain_named(&mut self, name: &str) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter(|(event, _)| event == name)
            .map(|(_, data)| data)
            .collect()
    }
}

/// Authenticate `user` with a fresh token and admit the session.
pub async fn connect(state: &AppState, user: &UserRecord) -> TestClient {
    let token = mint_token(&user.id);
    let identity = state
        .gateway
        .authenticate(Some(&token))
        .await
        .expect("authenticate test user");
    let session_id = beacon_common::id::prefixed_ulid(beacon_common::id::prefix::SESSION);
    let (tx, rx) = mpsc::unbounded_channel();
    state.gateway.connect(session_id.clone(), identity, tx);
    TestClient {
        session_id,
        user: user.clone(),
        rx,
    }
}

/// Connect and join the user's home community.
pub async fn connect_in_community(state: &AppState, user: &UserRecord) -> TestClient {
    let mut client = connect(state, user).await;
    state
        .gateway
        .dispatch(
            &client.session_id,
            "join_community",
            Value::String(user.community.clone()),
        )
        .await
        .expect("join community");
    client.drain();
    client
}
