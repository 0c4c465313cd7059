use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use axum::extract::FromRequestParts;
use uuid::Uuid;

use crate::auth;
use crate::error::ApiError;
use crate::middleware::logging::RequestIdentity;

/// Acting identity recovered from the bearer credential. Carries the id
/// only; handlers load full account state (is_active, is_admin) from the
/// store when they need it.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser {
    pub id: Uuid,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // An absent or malformed header is treated the same as a bad token
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::debug!("missing or malformed Authorization header");
            ApiError::unauthorized("Invalid token")
        })?;

        let claims = auth::verify_token(token)?;
        // Surface the resolved identity to the failure-logging layer
        if let Some(identity) = parts.extensions.get::<RequestIdentity>() {
            identity.record(claims.sub);
        }
        Ok(AuthUser { id: claims.sub })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
