//! Identity Resolution
//!
//! Turns the bearer credential presented on a chat handshake into a user id.
//! Tokens are issued by the account service; this side only verifies them.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtSettings;

/// Resolves a bearer credential to a user identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Validate the credential and return the user id it was issued for.
    async fn resolve(&self, credential: &str) -> Result<Uuid, AuthError>;
}

/// Access token claims as issued by the account service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID. Older tokens carry it as `sub`.
    #[serde(alias = "sub")]
    pub user_id: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// `access` or `refresh`; absent on tokens from other issuers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("User is inactive")]
    Inactive,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// HS256 access-token verifier.
pub struct JwtIdentityResolver {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = settings.leeway_secs;

        Self {
            key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
        }
    }

    fn decode_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        // Refresh tokens share the signing key and must not open connections
        match token_data.claims.token_type.as_deref() {
            None | Some("access") => Ok(token_data.claims),
            Some(_) => Err(AuthError::InvalidToken),
        }
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<Uuid, AuthError> {
        let claims = self.decode_access_token(credential)?;
        Uuid::parse_str(&claims.user_id).map_err(|_| AuthError::InvalidToken)
    }
}
