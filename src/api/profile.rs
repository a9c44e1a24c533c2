use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::api::extract::ApiJson;
use crate::api::state::AppState;
use crate::api::validation::{
    validate_email, validate_optional_text, validate_username, MAX_BIO_LENGTH,
    MAX_FULL_NAME_LENGTH, MAX_STATUS_LENGTH, MAX_URL_LENGTH,
};
use crate::crypto::AuthUser;
use crate::db::{self, Profile, ProfileChanges, ProfileRepository, UserRepository};
use crate::error::AppError;

/// Partial update; absent fields are left alone
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub status: Option<String>,
}

impl UpdateProfileRequest {
    fn into_changes(self) -> Result<(Option<String>, ProfileChanges), AppError> {
        let email = self.email.as_deref().map(validate_email).transpose()?;
        let optional = |field: &str, value: Option<String>, max: usize| {
            value
                .map(|v| validate_optional_text(field, &v, max))
                .transpose()
        };

        let changes = ProfileChanges {
            username: self.username.as_deref().map(validate_username).transpose()?,
            full_name: optional("Full name", self.full_name, MAX_FULL_NAME_LENGTH)?,
            avatar_url: optional("Avatar URL", self.avatar_url, MAX_URL_LENGTH)?,
            bio: optional("Bio", self.bio, MAX_BIO_LENGTH)?,
            status: optional("Status", self.status, MAX_STATUS_LENGTH)?,
        };

        Ok((email, changes))
    }
}

async fn own_profile(state: &AppState, user_id: i64) -> Result<Profile, AppError> {
    ProfileRepository::get_by_user_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(own_profile(&state, auth.id).await?))
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    let (email, changes) = req.into_changes()?;
    if email.is_none() && changes.is_empty() {
        return Ok(Json(own_profile(&state, auth.id).await?));
    }

    // Uniqueness checks, the read and the write all happen under the write lock
    let mut tx = db::begin_immediate(&state.db).await?;

    if let Some(email) = &email {
        if let Some(existing) = UserRepository::get_by_email(&mut *tx, email).await? {
            if existing.id != auth.id {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
        }
    }
    if let Some(username) = &changes.username {
        if let Some(existing) = ProfileRepository::get_by_username(&mut *tx, username).await? {
            if existing.user_id != auth.id {
                return Err(AppError::Conflict("Username already taken".to_string()));
            }
        }
    }

    let mut profile = ProfileRepository::get_by_user_id(&mut *tx, auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    changes.apply(&mut profile);

    if let Some(email) = &email {
        UserRepository::update_email(&mut *tx, auth.id, email).await?;
    }
    let saved = ProfileRepository::save(&mut *tx, &profile).await?;
    tx.commit().await?;

    tracing::debug!("📝 Profile updated for user {}", auth.id);
    Ok(Json(saved))
}
