use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while authenticating a signed login request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The request body could not be parsed into the expected shape
    #[error("Invalid request data: {0}")]
    MalformedRequest(String),

    /// The claimed address is not a 20-byte hex address
    #[error("Invalid Ethereum address: {0}")]
    InvalidAddress(String),

    /// The signature is not valid hex, not 65 bytes, or carries a bad recovery byte
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// No public key could be recovered from the digest and signature
    #[error("Failed to recover public key from signature")]
    RecoveryFailure,

    /// A key was recovered but it does not belong to the claimed address
    #[error("Invalid signature")]
    SignatureMismatch,

    /// The user directory failed or kept reporting a conflict
    #[error("Failed to process user: {0}")]
    Directory(String),

    /// The token issuer could not produce a session token
    #[error("Failed to create auth token: {0}")]
    Issuance(String),
}

impl AuthError {
    /// Stable machine-readable identifier for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "malformed_request",
            Self::InvalidAddress(_) => "invalid_address",
            Self::MalformedSignature(_) => "malformed_signature",
            Self::RecoveryFailure => "recovery_failure",
            Self::SignatureMismatch => "signature_mismatch",
            Self::Directory(_) => "directory_error",
            Self::Issuance(_) => "issuance_error",
        }
    }

    /// HTTP status the error is reported with.
    ///
    /// Failures caused by the caller's input are client errors; storage and
    /// token failures are on our side and map to 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_)
            | Self::InvalidAddress(_)
            | Self::MalformedSignature(_)
            | Self::RecoveryFailure
            | Self::SignatureMismatch => StatusCode::BAD_REQUEST,
            Self::Directory(_) | Self::Issuance(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs, the client gets a generic reason
        let message = match &self {
            Self::Directory(_) => "Failed to process user".to_string(),
            Self::Issuance(_) => "Failed to create auth token".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.kind(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
