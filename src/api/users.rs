use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::api::extract::{ApiPath, ApiQuery};
use crate::api::state::AppState;
use crate::crypto::AuthUser;
use crate::db::{Profile, ProfileRepository, UserRepository, UserWithProfile};
use crate::error::AppError;

const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub email: String,
}

/// GET /api/users/:user_id/profile
pub async fn get_user_profile(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<Json<Profile>, AppError> {
    let profile = ProfileRepository::get_by_user_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(profile))
}

/// GET /api/users/search?email=
pub async fn search_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<UserWithProfile>>, AppError> {
    let needle = query.email.trim();
    if needle.is_empty() {
        return Err(AppError::Validation("Search requires an email query".to_string()));
    }

    let users = UserRepository::search_by_email(&state.db, auth.id, needle, SEARCH_LIMIT).await?;
    Ok(Json(users))
}

/// GET /api/users/all
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<UserWithProfile>>, AppError> {
    Ok(Json(UserRepository::list_directory(&state.db, auth.id).await?))
}
