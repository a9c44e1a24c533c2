use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::extract::ApiJson;
use crate::api::state::AppState;
use crate::api::validation::{validate_email, validate_full_name, validate_password, validate_username};
use crate::crypto::{hash_password_blocking, verify_credentials, AuthUser};
use crate::db::{Profile, ProfileRepository, UserInfo, UserRepository};
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserInfo,
    pub profile: Profile,
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserInfo,
    pub profile: Option<Profile>,
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = validate_email(&req.email)?;
    validate_password(&req.password)?;
    let username = validate_username(&req.username)?;
    let full_name = validate_full_name(&req.full_name)?;

    if UserRepository::get_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }
    if ProfileRepository::get_by_username(&state.db, &username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let password_hash = hash_password_blocking(req.password).await?;

    // User and profile land together or not at all
    let mut tx = state.db.begin().await?;
    let user = UserRepository::create(&mut *tx, &email, &password_hash).await?;
    let profile = ProfileRepository::create(&mut *tx, user.id, &username, Some(&full_name)).await?;
    tx.commit().await?;

    tracing::info!("👤 New user {} registered as @{}", user.id, profile.username);

    let issued = state.credentials.issue(user.id, &user.email)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserInfo::from(&user),
            profile,
            token: issued.token,
            expires_at: issued.expires_at,
        }),
    ))
}

/// POST /api/auth/signin
pub async fn signin(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SigninRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("Email and password are required".to_string()));
    }
    let email = req.email.trim().to_lowercase();

    // Unknown email and wrong password are indistinguishable to the caller, timing included
    let user = UserRepository::get_by_email(&state.db, &email).await?;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = verify_credentials(req.password, stored_hash).await?;

    let user = match user {
        Some(user) if verified => user,
        _ => return Err(AppError::Auth("Invalid credentials".to_string())),
    };

    ProfileRepository::touch_last_seen(&state.db, user.id).await?;
    let profile = ProfileRepository::get_by_user_id(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("User {} has no profile", user.id)))?;

    let issued = state.credentials.issue(user.id, &user.email)?;
    tracing::debug!("🔑 User {} signed in", user.id);

    Ok(Json(AuthResponse {
        user: UserInfo::from(&user),
        profile,
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// POST /api/auth/signout
///
/// Tokens are stateless; the client discards its copy.
pub async fn signout() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "Signed out successfully"}))
}

/// GET /api/auth/me (requires auth via middleware)
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MeResponse>, AppError> {
    let user = UserRepository::get_by_id(&state.db, auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let profile = ProfileRepository::get_by_user_id(&state.db, auth.id).await?;

    Ok(Json(MeResponse {
        user: UserInfo::from(&user),
        profile,
    }))
}
