use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon_api::config::Config;
use beacon_api::db::pg::PgStore;
use beacon_api::db::store::{MemoryStore, Store};
use beacon_api::AppState;

/// Upper bound on pooled Postgres connections.
const DB_POOL_SIZE: usize = 20;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = beacon_api::db::pool::connect(url, DB_POOL_SIZE)
                .expect("failed to build connection pool");
            Arc::new(PgStore::new(pool).with_statement_timeout(config.statement_timeout()))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(
        history_limit = config.history_limit,
        trust_client_timestamps = config.trust_client_timestamps,
        "beacon-api configured"
    );

    let state = AppState::new(config, store);
    let (app, _io) = beacon_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "beacon-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
