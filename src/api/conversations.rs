use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;

use crate::api::extract::{ApiJson, ApiPath};
use crate::api::state::AppState;
use crate::api::validation::{validate_conversation_name, validate_optional_text, MAX_URL_LENGTH};
use crate::crypto::AuthUser;
use crate::db::{
    Conversation, ConversationDetails, ConversationRepository, ConversationSummary,
    NewConversation, UserRepository,
};
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub name: Option<String>,
    pub is_group: bool,
    pub avatar_url: Option<String>,
    #[serde(alias = "participantIds")]
    pub participants: Vec<i64>,
}

impl CreateConversationRequest {
    /// Normalise into a [`NewConversation`]: de-duplicated participants without the creator
    pub fn into_new(self, creator_id: i64) -> Result<NewConversation, AppError> {
        let name = validate_conversation_name(self.name.as_deref())?;
        let avatar_url = self
            .avatar_url
            .map(|url| validate_optional_text("Avatar URL", &url, MAX_URL_LENGTH))
            .transpose()?
            .filter(|url| !url.is_empty());

        let mut participant_ids: Vec<i64> = Vec::with_capacity(self.participants.len());
        for id in self.participants {
            if id != creator_id && !participant_ids.contains(&id) {
                participant_ids.push(id);
            }
        }

        if self.is_group {
            if name.is_none() {
                return Err(AppError::Validation("Group conversations need a name".to_string()));
            }
            if participant_ids.is_empty() {
                return Err(AppError::Validation(
                    "Group conversations need at least one other participant".to_string(),
                ));
            }
        } else if participant_ids.len() != 1 {
            return Err(AppError::Validation(
                "Direct conversations need exactly one other participant".to_string(),
            ));
        }

        Ok(NewConversation {
            creator_id,
            is_group: self.is_group,
            name,
            avatar_url,
            participant_ids,
        })
    }
}

/// Loads the conversation and checks that `user_id` is an active participant
pub async fn require_participant(
    state: &AppState,
    conversation_id: &str,
    user_id: i64,
) -> Result<Conversation, AppError> {
    let conversation = ConversationRepository::get_by_id(&state.db, conversation_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

    if !ConversationRepository::is_active_participant(&state.db, conversation_id, user_id).await? {
        return Err(AppError::Forbidden(
            "You are not a participant in this conversation".to_string(),
        ));
    }

    Ok(conversation)
}

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    Ok(Json(ConversationRepository::summaries_for_user(&state.db, auth.id).await?))
}

/// POST /api/conversations
///
/// Responds 201 for a new conversation and 200 when an existing direct one is reused.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationDetails>), AppError> {
    let new = req.into_new(auth.id)?;

    let missing = UserRepository::missing_ids(&state.db, &new.participant_ids).await?;
    if let Some(id) = missing.first() {
        return Err(AppError::NotFound(format!("User {} not found", id)));
    }

    let (conversation, created) = ConversationRepository::create_or_get_direct(&state.db, new).await?;
    if created {
        tracing::info!("💬 User {} created conversation {}", auth.id, conversation.id);
    }

    let details = ConversationRepository::details(&state.db, conversation, auth.id).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };

    Ok((status, Json(details)))
}

/// GET /api/conversations/:id/details
pub async fn get_conversation_details(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(conversation_id): ApiPath<String>,
) -> Result<Json<ConversationDetails>, AppError> {
    let conversation = require_participant(&state, &conversation_id, auth.id).await?;

    Ok(Json(ConversationRepository::details(&state.db, conversation, auth.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(is_group: bool, name: Option<&str>, participants: Vec<i64>) -> CreateConversationRequest {
        CreateConversationRequest {
            name: name.map(str::to_string),
            is_group,
            avatar_url: None,
            participants,
        }
    }

    #[test]
    fn test_creator_and_duplicates_removed() {
        let new = request(true, Some("Team"), vec![2, 1, 3, 2]).into_new(1).unwrap();
        assert_eq!(new.participant_ids, vec![2, 3]);
        assert_eq!(new.creator_id, 1);
    }

    #[test]
    fn test_direct_needs_exactly_one_other() {
        assert!(request(false, None, vec![2]).into_new(1).is_ok());
        assert!(request(false, None, vec![1, 2, 2]).into_new(1).is_ok());
        assert!(request(false, None, vec![]).into_new(1).is_err());
        assert!(request(false, None, vec![1]).into_new(1).is_err());
        assert!(request(false, None, vec![2, 3]).into_new(1).is_err());
    }

    #[test]
    fn test_group_needs_name_and_members() {
        assert!(request(true, None, vec![2]).into_new(1).is_err());
        assert!(request(true, Some("  "), vec![2]).into_new(1).is_err());
        assert!(request(true, Some("Team"), vec![1]).into_new(1).is_err());
    }

    #[test]
    fn test_accepts_participant_ids_alias() {
        let req: CreateConversationRequest =
            serde_json::from_str(r#"{"isGroup": false, "participantIds": [5]}"#).unwrap();
        assert_eq!(req.participants, vec![5]);
        assert!(!req.is_group);
    }
}
