use async_trait::async_trait;

use crate::error::AuthError;

/// Issues session credentials for authenticated users.
///
/// The token format and lifetime belong to the implementation; callers treat
/// the returned string as an opaque bearer credential.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issue a token bound to the user with id `user_id`.
    ///
    /// Failures are reported as `AuthError::Issuance`.
    async fn issue(&self, user_id: &str) -> Result<String, AuthError>;
}
