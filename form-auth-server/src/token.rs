use async_trait::async_trait;
use chrono::Utc;
use form_eth_auth::{AuthError, TokenIssuer};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token type claim for user session tokens
pub const AUTH_RECORD_TOKEN_TYPE: &str = "authRecord";

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Id of the user the token is bound to
    pub sub: String,
    /// Token type
    pub typ: String,
    /// Issued-at timestamp
    pub iat: u64,
    /// Expiration timestamp
    pub exp: u64,
}

/// HS256 JWT session token issuer
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: u64,
}

impl std::fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIssuer").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl JwtIssuer {
    pub fn new(secret: &[u8], ttl: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Build and sign the claims for `user_id`
    pub fn issue_token(&self, user_id: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = SessionClaims {
            sub: user_id.to_string(),
            typ: AUTH_RECORD_TOKEN_TYPE.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Issuance(e.to_string()))
    }

    /// Check a token's signature and expiry and return its claims
    pub fn verify(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<SessionClaims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}

#[async_trait]
impl TokenIssuer for JwtIssuer {
    async fn issue(&self, user_id: &str) -> Result<String, AuthError> {
        if user_id.is_empty() {
            return Err(AuthError::Issuance("cannot issue a token without a user id".to_string()));
        }
        self.issue_token(user_id)
    }
}
