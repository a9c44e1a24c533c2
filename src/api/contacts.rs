use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;

use crate::api::extract::ApiJson;
use crate::api::state::AppState;
use crate::crypto::AuthUser;
use crate::db::{ContactRepository, ContactStatus, ContactWithProfile, ProfileRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContactRequest {
    pub contact_id: i64,
}

/// GET /api/contacts
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ContactWithProfile>>, AppError> {
    Ok(Json(ContactRepository::list_accepted(&state.db, auth.id).await?))
}

/// POST /api/contacts
///
/// Contacts are added unilaterally and are accepted immediately.
pub async fn add_contact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<AddContactRequest>,
) -> Result<(StatusCode, Json<ContactWithProfile>), AppError> {
    if req.contact_id == auth.id {
        return Err(AppError::Validation("You cannot add yourself as a contact".to_string()));
    }

    let contact_profile = ProfileRepository::get_by_user_id(&state.db, req.contact_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if ContactRepository::get(&state.db, auth.id, req.contact_id).await?.is_some() {
        return Err(AppError::Conflict("Contact already exists".to_string()));
    }

    let contact = ContactRepository::create(
        &state.db,
        auth.id,
        req.contact_id,
        ContactStatus::Accepted,
    )
    .await?;

    tracing::debug!("🤝 User {} added contact {}", auth.id, req.contact_id);
    Ok((
        StatusCode::CREATED,
        Json(ContactWithProfile {
            contact,
            contact_profile,
        }),
    ))
}
