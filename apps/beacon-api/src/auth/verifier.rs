//! Connection-time credential verification.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::store::{Store, StoreError};

/// Canonical sender identity, resolved once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    /// Home community from the user record. The only community the
    /// session may join.
    pub community: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication error: No token provided")]
    MissingCredential,
    #[error("Authentication error: Invalid token")]
    InvalidCredential,
    #[error("Authentication error: User not found")]
    UnknownUser,
    #[error("Authentication error: {0}")]
    Store(#[from] StoreError),
}

/// Resolves a raw credential to an [`Identity`].
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: Option<&str>) -> Result<Identity, AuthError>;
}

/// Claims of the login token handed out by the REST layer.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub exp: i64,
}

/// HS256 JWT verifier. Username and community are hydrated from the store
/// so a renamed user is never announced under a stale name.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    store: Arc<dyn Store>,
}

impl JwtVerifier {
    pub fn new(secret: &str, store: Arc<dyn Store>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            store,
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| {
                tracing::debug!(?e, "token validation failed");
                AuthError::InvalidCredential
            })?;

        let user = self
            .store
            .find_user(&data.claims.user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        Ok(Identity {
            user_id: user.id,
            username: user.username,
            community: user.community,
        })
    }
}
