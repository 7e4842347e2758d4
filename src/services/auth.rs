//! Authentication port. Token issuance and verification live outside the engine.

use async_trait::async_trait;

use crate::error::AppResult;

/// Resolves an opaque bearer token to the user it was issued to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthService: Send + Sync {
    /// `Authentication` error when the token is invalid or expired
    async fn validate_token(&self, token: &str) -> AppResult<i64>;
}
