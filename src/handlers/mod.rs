pub mod auth;
pub mod comments;
pub mod posts;

use uuid::Uuid;

use crate::error::ApiError;

/// Path identifiers are parsed by hand so a malformed id gets the standard
/// envelope instead of the framework's default rejection.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidId)
}
