use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::conversations::require_participant;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::state::AppState;
use crate::api::validation::{
    validate_message_content, validate_message_type, validate_optional_text, MAX_URL_LENGTH,
};
use crate::crypto::AuthUser;
use crate::db::{Cursor, MessagePage, MessageRepository, MessageWithSender, NewMessage, PageRequest};
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub content: String,
    pub message_type: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub reply_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
    /// Message id; return messages older than it
    pub before: Option<String>,
    /// Message id; return messages newer than it (polling)
    pub after: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

impl ListMessagesQuery {
    fn into_page(self) -> Result<PageRequest, AppError> {
        let cursor = match (self.before, self.after) {
            (Some(_), Some(_)) => {
                return Err(AppError::Validation(
                    "Use either 'before' or 'after', not both".to_string(),
                ))
            }
            (Some(id), None) => Some(Cursor::Before(id)),
            (None, Some(id)) => Some(Cursor::After(id)),
            (None, None) => None,
        };

        Ok(PageRequest::new(self.limit, cursor))
    }
}

/// GET /api/conversations/:id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(conversation_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<ListMessagesQuery>,
) -> Result<Json<MessagePage>, AppError> {
    require_participant(&state, &conversation_id, auth.id).await?;
    let page = query.into_page()?;

    if let Some(Cursor::Before(id) | Cursor::After(id)) = &page.cursor {
        if MessageRepository::get_in_conversation(&state.db, &conversation_id, id).await?.is_none() {
            return Err(AppError::NotFound("Cursor message not found".to_string()));
        }
    }

    Ok(Json(MessageRepository::list_page(&state.db, &conversation_id, &page).await?))
}

/// POST /api/conversations/:id/messages
///
/// No fan-out: other participants pick the message up on their next poll.
pub async fn post_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(conversation_id): ApiPath<String>,
    ApiJson(req): ApiJson<PostMessageRequest>,
) -> Result<(StatusCode, Json<MessageWithSender>), AppError> {
    require_participant(&state, &conversation_id, auth.id).await?;

    validate_message_content(&req.content)?;
    let message_type = match req.message_type.as_deref() {
        Some(tag) => validate_message_type(tag)?,
        None => "text".to_string(),
    };
    let file_url = req
        .file_url
        .map(|url| validate_optional_text("File URL", &url, MAX_URL_LENGTH))
        .transpose()?
        .filter(|url| !url.is_empty());
    let file_name = req
        .file_name
        .map(|name| validate_optional_text("File name", &name, 255))
        .transpose()?
        .filter(|name| !name.is_empty());
    if req.file_size.is_some_and(|size| size < 0) {
        return Err(AppError::Validation("File size cannot be negative".to_string()));
    }

    if let Some(reply_to) = &req.reply_to {
        if MessageRepository::get_in_conversation(&state.db, &conversation_id, reply_to).await?.is_none() {
            return Err(AppError::Validation(
                "Reply target not found in this conversation".to_string(),
            ));
        }
    }

    let message = MessageRepository::create(
        &state.db,
        NewMessage {
            conversation_id,
            sender_id: auth.id,
            content: req.content,
            message_type,
            file_url,
            file_name,
            file_size: req.file_size,
            reply_to: req.reply_to,
        },
    )
    .await?;

    tracing::debug!("✉️  User {} posted {} to {}", auth.id, message.message.id, message.message.conversation_id);
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/conversations/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(conversation_id): ApiPath<String>,
) -> Result<Json<MarkReadResponse>, AppError> {
    require_participant(&state, &conversation_id, auth.id).await?;

    let updated = MessageRepository::mark_read(&state.db, &conversation_id, auth.id).await?;
    Ok(Json(MarkReadResponse { updated }))
}
