mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use beacon_api::auth::{AuthError, Identity, IdentityVerifier};
use beacon_api::db::store::{MemoryStore, Store};
use beacon_api::models::message::{NewChatMessage, ParentKind};
use beacon_api::models::user::UserRecord;
use beacon_api::AppState;

fn bearer(user_id: &str) -> String {
    format!("Bearer {}", common::mint_token(user_id))
}

fn server(state: beacon_api::AppState) -> TestServer {
    let (app, _io) = beacon_api::app(state);
    TestServer::new(app).unwrap()
}

// ===========================================================================
// GET /health
// ===========================================================================

#[tokio::test]
async fn health_is_public() {
    let (state, _store) = common::test_state();
    let server = server(state);

    let resp = server.get("/health").await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>(), json!({"status": "ok"}));
}

// ===========================================================================
// GET /api/alert-messages/{alert_id}
// ===========================================================================

#[tokio::test]
async fn alert_history_is_ascending_and_community_scoped() {
    let (state, store) = common::test_state();
    let ana = common::seed_user(&store, "ana", "oak");
    let ben = common::seed_user(&store, "ben", "pine");
    let alert = common::seed_alert(&store, &ana, "oak");

    for (minute, text) in [(5, "second"), (1, "first"), (9, "third")] {
        store
            .create_message(NewChatMessage {
                kind: ParentKind::Alert,
                parent_id: alert.id.clone(),
                user_id: ana.id.clone(),
                username: ana.username.clone(),
                message: text.to_string(),
                timestamp: chrono::DateTime::parse_from_rfc3339(&format!(
                    "2024-01-01T10:0{minute}:00Z"
                ))
                .unwrap()
                .with_timezone(&chrono::Utc),
            })
            .await
            .unwrap();
    }

    let server = server(state);
    let resp = server
        .get(&format!("/api/alert-messages/{}", alert.id))
        .add_header(AUTHORIZATION, bearer(&ana.id))
        .await;
    resp.assert_status_ok();
    let body: Vec<Value> = resp.json();
    let texts: Vec<&str> = body.iter().map(|m| m["message"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    assert_eq!(body[0]["alertId"], alert.id.as_str());
    assert_eq!(body[0]["timestamp"], "2024-01-01T10:01:00.000Z");

    let resp = server
        .get(&format!("/api/alert-messages/{}", alert.id))
        .add_header(AUTHORIZATION, bearer(&ben.id))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(resp.json::<Value>()["error"]["message"], "Access denied");
}

#[tokio::test]
async fn alert_history_unknown_alert_is_404() {
    let (state, store) = common::test_state();
    let ana = common::seed_user(&store, "ana", "oak");
    let server = server(state);

    let resp = server
        .get("/api/alert-messages/alr_missing")
        .add_header(AUTHORIZATION, bearer(&ana.id))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn history_requires_auth() {
    let (state, _store) = common::test_state();
    let server = server(state);

    let resp = server.get("/api/event-messages/evt_1").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.json::<Value>()["error"]["message"],
        "Authentication error: No token provided"
    );

    let resp = server
        .get("/api/event-messages/evt_1")
        .add_header(AUTHORIZATION, "Bearer nope".to_string())
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn history_is_capped_at_the_configured_limit() {
    let mut config = common::test_config();
    config.history_limit = 3;
    let (state, store) = common::test_state_with(config);
    let u1 = common::seed_user(&store, "u1", "oak");
    let event = common::seed_event(&store, &u1, 5);
    let server = server(state);

    for i in 0..5 {
        server
            .post(&format!("/api/event-messages/{}", event.id))
            .add_header(AUTHORIZATION, bearer(&u1.id))
            .json(&json!({
                "message": format!("m{i}"),
                "timestamp": format!("2024-01-01T10:0{i}:00.000Z"),
            }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let body: Vec<Value> = server
        .get(&format!("/api/event-messages/{}", event.id))
        .add_header(AUTHORIZATION, bearer(&u1.id))
        .await
        .json();
    let texts: Vec<&str> = body.iter().map(|m| m["message"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["m2", "m3", "m4"]);
}

// ===========================================================================
// POST /api/event-messages/{event_id}
// ===========================================================================

#[tokio::test]
async fn rest_send_goes_through_the_relay() {
    let (state, store) = common::test_state();
    let u1 = common::seed_user(&store, "u1", "oak");
    let u3 = common::seed_user(&store, "u3", "oak");
    let event = common::seed_event(&store, &u1, 5);

    let mut live = common::connect_in_community(&state, &u1).await;
    state
        .gateway
        .dispatch(&live.session_id, "join_event", json!(event.id))
        .await
        .unwrap();
    let server = server(state.clone());

    let resp = server
        .post(&format!("/api/event-messages/{}", event.id))
        .add_header(AUTHORIZATION, bearer(&u1.id))
        .json(&json!({"message": "from the web form"}))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let created: Value = resp.json();
    assert_eq!(created["eventId"], event.id.as_str());
    assert_eq!(created["username"], "u1");

    let broadcast = live.drain_named("new_event_message");
    assert_eq!(broadcast.len(), 1);
    assert_eq!(broadcast[0]["_id"], created["_id"]);

    let resp = server
        .post(&format!("/api/event-messages/{}", event.id))
        .add_header(AUTHORIZATION, bearer(&u3.id))
        .json(&json!({"message": "hi"}))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);

    let resp = server
        .post(&format!("/api/event-messages/{}", event.id))
        .add_header(AUTHORIZATION, bearer(&u1.id))
        .json(&json!({"message": "   "}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.json::<Value>()["error"]["message"],
        "Message cannot be empty"
    );
    assert_eq!(store.message_count(), 1);
}

#[tokio::test]
async fn rest_send_reports_write_failure_as_500() {
    let (state, store) = common::test_state();
    let u1 = common::seed_user(&store, "u1", "oak");
    let event = common::seed_event(&store, &u1, 5);
    store.set_fail_writes(true);
    let server = server(state);

    let resp = server
        .post(&format!("/api/event-messages/{}", event.id))
        .add_header(AUTHORIZATION, bearer(&u1.id))
        .json(&json!({"message": "hello"}))
        .await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        resp.json::<Value>()["error"]["message"],
        "Failed to send message"
    );
}

// ===========================================================================
// Presence
// ===========================================================================

#[tokio::test]
async fn presence_lists_online_usernames() {
    let (state, store) = common::test_state();
    let ana = common::seed_user(&store, "ana", "oak");
    let ola = common::seed_user(&store, "ola", "oak");
    let ben = common::seed_user(&store, "ben", "pine");
    let alert = common::seed_alert(&store, &ana, "oak");

    for user in [&ola, &ana, &ana] {
        let client = common::connect_in_community(&state, user).await;
        state
            .gateway
            .dispatch(&client.session_id, "join_alert", json!(alert.id))
            .await
            .unwrap();
    }
    let server = server(state);

    let resp = server
        .get(&format!("/api/alerts/{}/presence", alert.id))
        .add_header(AUTHORIZATION, bearer(&ana.id))
        .await;
    resp.assert_status_ok();
    assert_eq!(
        resp.json::<Value>(),
        json!({
            "room": format!("alert:{}", alert.id),
            "online": ["ana", "ola"],
            "count": 2,
        })
    );

    server
        .get(&format!("/api/alerts/{}/presence", alert.id))
        .add_header(AUTHORIZATION, bearer(&ben.id))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn event_presence_requires_attendance() {
    let (state, store) = common::test_state();
    let u1 = common::seed_user(&store, "u1", "oak");
    let u3 = common::seed_user(&store, "u3", "oak");
    let event = common::seed_event(&store, &u1, 5);
    let server = server(state);

    let resp = server
        .get(&format!("/api/events/{}/presence", event.id))
        .add_header(AUTHORIZATION, bearer(&u1.id))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["count"], 0);

    server
        .get(&format!("/api/events/{}/presence", event.id))
        .add_header(AUTHORIZATION, bearer(&u3.id))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

// ===========================================================================
// Bearer identity
// ===========================================================================

/// Accepts any credential as one fixed identity.
struct FixedIdentity(Identity);

#[async_trait]
impl IdentityVerifier for FixedIdentity {
    async fn verify(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        credential.ok_or(AuthError::MissingCredential)?;
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn http_caller_is_taken_from_the_verified_identity() {
    let store = Arc::new(MemoryStore::new());
    let author = UserRecord {
        id: "usr_author".into(),
        username: "ana".into(),
        community: "oak".into(),
    };
    store.insert_user(author.clone());
    let alert = common::seed_alert(&store, &author, "oak");

    // "rae" has no user row, so a second store lookup would turn this into 401.
    let verifier = Arc::new(FixedIdentity(Identity {
        user_id: "usr_rae".into(),
        username: "rae".into(),
        community: "oak".into(),
    }));
    let state = AppState::with_verifier(common::test_config(), store.clone(), verifier);
    let server = server(state);

    let resp = server
        .get(&format!("/api/alert-messages/{}", alert.id))
        .add_header(AUTHORIZATION, "Bearer anything")
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>(), json!([]));

    server
        .get(&format!("/api/alert-messages/{}", alert.id))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
