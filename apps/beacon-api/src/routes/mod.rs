pub mod health;
pub mod messages;
pub mod presence;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            messages::router().merge(presence::router()),
        )
}
