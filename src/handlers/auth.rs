//! Registration, login, current-identity lookup, and logout.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::State;
use serde_json::{json, Value};

use crate::auth;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::models::{NewUser, UserProfile};
use crate::routes::AppState;
use crate::validate::{LoginRequest, RegisterRequest, ValidJson};

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> ApiResult<Value> {
    let registration = body.into_registration()?;

    // Pre-check for a friendlier message; the unique index is the backstop
    if state
        .store
        .user_by_email_or_username(&registration.email, &registration.username)
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request(
            "User with this email or username already exists",
        ));
    }

    let password_hash = hash_password(registration.password).await?;
    let user = state
        .store
        .create_user(NewUser {
            email: registration.email,
            username: registration.username,
            first_name: registration.first_name,
            last_name: registration.last_name,
            avatar: registration.avatar,
            password_hash,
        })
        .await?;

    let token = auth::issue_token(user.id)?;
    Ok(ApiResponse::created(
        json!({ "user": UserProfile::from(user), "token": token }),
        "User registered successfully",
    ))
}

/// POST /api/auth/login
///
/// Unknown email, wrong password, and deactivated account all produce the
/// identical rejection; nothing in the response says which check failed.
pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> ApiResult<Value> {
    let (email, password) = body.into_credentials()?;

    let user = match state.store.user_by_email(&email).await? {
        Some(user) if user.is_active => user,
        _ => return Err(ApiError::unauthorized("Invalid credentials")),
    };

    if !verify_password(password, user.password_hash.clone()).await? {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = auth::issue_token(user.id)?;
    Ok(ApiResponse::with_message(
        json!({ "user": UserProfile::from(user), "token": token }),
        "Login successful",
    ))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<UserProfile> {
    let user = state
        .store
        .user_by_id(auth_user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(ApiResponse::success(UserProfile::from(user)))
}

/// POST /api/auth/logout - stateless acknowledgment; the credential stays
/// valid until expiry (no revocation list).
pub async fn logout(_auth_user: AuthUser) -> ApiResult<()> {
    Ok(ApiResponse::with_message((), "Logged out successfully"))
}

/// Argon2 hashing on the blocking pool; the request task suspends instead
/// of stalling the runtime.
async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(ApiError::internal)?
    .map_err(ApiError::internal)
}

async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&hash) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(ApiError::internal)
}
