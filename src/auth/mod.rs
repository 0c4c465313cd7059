use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::error::ApiError;

/// Bearer credential payload: vouches for identity only. Current account
/// state (is_active, is_admin) is looked up per request by whoever needs it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("token generation failed: {0}")]
    Generation(String),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::unauthorized("Token expired"),
            TokenError::Invalid => ApiError::unauthorized("Invalid token"),
            TokenError::Generation(msg) => ApiError::internal(msg),
        }
    }
}

/// Sign a credential for the given identity with the configured secret and
/// lifetime.
pub fn issue_token(user_id: Uuid) -> Result<String, TokenError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(TokenError::Generation("JWT secret not configured".into()));
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &Claims::new(user_id), &encoding_key)
        .map_err(|e| TokenError::Generation(e.to_string()))
}

/// Verify signature and expiry. Bad signature, malformed structure, and
/// expiry collapse to the same rejection class for callers; the precise
/// cause is only kept in diagnostics.
pub fn verify_token(token: &str) -> Result<Claims, TokenError> {
    let secret = &config::config().security.jwt_secret;
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            tracing::debug!(cause = %e, "token verification failed");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id).expect("issue");
        let claims = verify_token(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn garbage_token_is_invalid() {
        assert!(matches!(verify_token("not-a-jwt"), Err(TokenError::Invalid)));
        assert!(matches!(verify_token(""), Err(TokenError::Invalid)));
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let token = issue_token(Uuid::new_v4()).expect("issue");
        let mut tampered = token[..token.len() - 2].to_string();
        tampered.push_str("xx");
        assert!(matches!(verify_token(&tampered), Err(TokenError::Invalid)));
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        // Sign claims whose expiry is well past the default 60s leeway
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let secret = &config::config().security.jwt_secret;
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode");
        assert!(matches!(verify_token(&token), Err(TokenError::Expired)));
    }
}
