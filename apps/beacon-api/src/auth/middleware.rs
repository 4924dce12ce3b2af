//! Bearer-token extraction for the HTTP surface.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::AuthError;
use crate::error::ApiError;
use crate::gateway::relay::Author;
use crate::AppState;

/// Authenticated user extracted from the `Authorization: Bearer <jwt>`
/// header. The verifier already resolved the home community.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
    pub community: String,
}

impl AuthUser {
    /// The caller as a message author, scoped to their home community.
    pub fn author(&self) -> Author<'_> {
        Author {
            user_id: &self.user_id,
            username: &self.username,
            community: Some(self.community.as_str()),
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        let identity = state.verifier.verify(token).await.map_err(|e| match e {
            AuthError::Store(err) => ApiError::from(err),
            other => ApiError::unauthorized(other.to_string()),
        })?;

        Ok(AuthUser {
            user_id: identity.user_id,
            username: identity.username,
            community: identity.community,
        })
    }
}
