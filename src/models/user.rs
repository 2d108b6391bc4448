//! Caller identity and token claims
//!
//! Accounts themselves are managed elsewhere; this server only verifies
//! bearer tokens and turns their claims into a [`Caller`].

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User email
    pub sub: String,
    pub user_id: i64,
    #[serde(default)]
    pub is_staff: bool,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user_id: i64, email: &str, is_staff: bool, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: email.to_string(),
            user_id,
            is_staff,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

/// The authenticated identity an operation runs on behalf of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub email: String,
    pub is_staff: bool,
}

impl From<UserClaims> for Caller {
    fn from(claims: UserClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.sub,
            is_staff: claims.is_staff,
        }
    }
}
