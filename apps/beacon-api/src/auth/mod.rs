pub mod middleware;
pub mod verifier;

pub use verifier::{AuthError, Identity, IdentityVerifier, JwtVerifier};
