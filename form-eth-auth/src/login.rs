//! The signed-login flow: parse, verify, resolve, issue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::address::{normalized, parse_address, to_checksum};
use crate::directory::{UserDirectory, UserRecord};
use crate::error::AuthError;
use crate::identity::resolve_or_create;
use crate::signature::verify_signature;
use crate::token::TokenIssuer;

/// Body of a login request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthRequest {
    pub address: String,
    pub signature: String,
    pub message: String,
}

/// Body of a successful login
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserRecord,
}

/// Collaborators the login flow needs, passed in rather than held globally
#[derive(Clone)]
pub struct AuthContext {
    pub directory: Arc<dyn UserDirectory>,
    pub issuer: Arc<dyn TokenIssuer>,
}

impl AuthContext {
    pub fn new(directory: Arc<dyn UserDirectory>, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self { directory, issuer }
    }
}

/// Authenticate a signed login request.
///
/// Steps run strictly in order and stop at the first failure, so a bad
/// address or signature never reaches the directory and a directory
/// failure never reaches the token issuer.
pub async fn authenticate(ctx: &AuthContext, request: &AuthRequest) -> Result<AuthResponse, AuthError> {
    let claimed = parse_address(&request.address)?;
    let checksummed = to_checksum(&claimed);
    log::debug!("ETH_AUTH: Login attempt for {}", checksummed);

    match verify_signature(&request.message, &request.signature, &checksummed) {
        Ok(true) => {}
        Ok(false) => {
            log::warn!("ETH_AUTH: Signature does not match {}", checksummed);
            return Err(AuthError::SignatureMismatch);
        }
        Err(e) => {
            log::warn!("ETH_AUTH: Signature check failed for {}: {}", checksummed, e);
            return Err(e);
        }
    }

    let user = resolve_or_create(ctx.directory.as_ref(), &normalized(&claimed)).await?;
    let token = ctx.issuer.issue(&user.id).await?;

    log::info!("ETH_AUTH: Authenticated {} as user {}", checksummed, user.id);
    Ok(AuthResponse { token, user })
}
