pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use socketioxide::SocketIo;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::{IdentityVerifier, JwtVerifier};
use config::Config;
use db::store::Store;
use gateway::{Dispatcher, Gateway, RoomRegistry};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub gateway: Arc<Gateway>,
    /// Hand this to the CRUD layer for community-wide notifications.
    pub dispatcher: Dispatcher,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the realtime core around a store, verifying tokens with the
    /// configured JWT secret.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let verifier: Arc<dyn IdentityVerifier> =
            Arc::new(JwtVerifier::new(&config.jwt_secret, store.clone()));
        Self::with_verifier(config, store, verifier)
    }

    pub fn with_verifier(
        config: Config,
        store: Arc<dyn Store>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let gateway = Arc::new(Gateway::new(
            verifier.clone(),
            store.clone(),
            registry.clone(),
            &config,
        ));
        Self {
            store,
            verifier,
            gateway,
            dispatcher: Dispatcher::new(registry),
            config: Arc::new(config),
        }
    }
}

/// The full HTTP + Socket.IO application.
pub fn app(state: AppState) -> (Router, SocketIo) {
    let (socket_layer, io) =
        gateway::server::layer(state.gateway.clone(), state.config.handshake_timeout);
    let cors = cors_layer(&state.config.cors_origins);

    let router = Router::new()
        .merge(routes::router())
        .with_state(state)
        .layer(socket_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    (router, io)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
