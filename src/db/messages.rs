use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};
use crate::db::conversations::ConversationRepository;
use crate::db::models::{prefixed_profile_columns, Message, MessageState, MessageWithSender};
use crate::db::{new_id, now_millis};
use crate::error::AppError;

/// Validated input for a new message
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_id: i64,
    pub content: String,
    pub message_type: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub reply_to: Option<String>,
}

/// Position relative to an existing message id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Before(String),
    After(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(limit: Option<i64>, cursor: Option<Cursor>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            cursor,
        }
    }
}

/// One page of messages, always oldest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<MessageWithSender>,
    /// More messages exist beyond this page in the requested direction
    pub has_more: bool,
}

pub struct MessageRepository;

impl MessageRepository {
    fn select_with_sender() -> String {
        format!(
            "SELECT m.*, {} FROM messages m JOIN profiles sp ON sp.user_id = m.sender_id",
            prefixed_profile_columns("sp", "sender_profile_")
        )
    }

    /// Store a message, bump the conversation and record a `sent` status for
    /// every other active participant, all in one transaction.
    pub async fn create(pool: &SqlitePool, new: NewMessage) -> Result<MessageWithSender, AppError> {
        let id = new_id();
        let now = now_millis();

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
INSERT INTO messages (
    id, conversation_id, sender_id, content, message_type,
    file_url, file_name, file_size, reply_to, created_at, updated_at
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.conversation_id)
        .bind(new.sender_id)
        .bind(&new.content)
        .bind(&new.message_type)
        .bind(&new.file_url)
        .bind(&new.file_name)
        .bind(new.file_size)
        .bind(&new.reply_to)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        ConversationRepository::touch(&mut *tx, &new.conversation_id, now).await?;

        let recipients: Vec<(i64,)> = sqlx::query_as(
            r#"
SELECT user_id FROM conversation_participants
WHERE conversation_id = ? AND user_id <> ? AND left_at IS NULL
            "#,
        )
        .bind(&new.conversation_id)
        .bind(new.sender_id)
        .fetch_all(&mut *tx)
        .await?;

        for (user_id,) in recipients {
            sqlx::query(
                "INSERT INTO message_status (id, message_id, user_id, status, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(&id)
            .bind(user_id)
            .bind(MessageState::Sent)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let message = Self::get_with_sender(&mut *tx, &id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch created message".to_string()))?;

        tx.commit().await?;

        Ok(message)
    }

    pub async fn get_with_sender(
        executor: impl SqliteExecutor<'_>,
        id: &str,
    ) -> Result<Option<MessageWithSender>, AppError> {
        let sql = format!("{} WHERE m.id = ?", Self::select_with_sender());

        let message = sqlx::query_as::<_, MessageWithSender>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(message)
    }

    /// Message `id` if it belongs to `conversation_id`
    pub async fn get_in_conversation(
        executor: impl SqliteExecutor<'_>,
        conversation_id: &str,
        id: &str,
    ) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE id = ? AND conversation_id = ?",
        )
        .bind(id)
        .bind(conversation_id)
        .fetch_optional(executor)
        .await?;

        Ok(message)
    }

    pub async fn latest(
        executor: impl SqliteExecutor<'_>,
        conversation_id: &str,
    ) -> Result<Option<MessageWithSender>, AppError> {
        let sql = format!(
            "{} WHERE m.conversation_id = ? ORDER BY m.created_at DESC, m.rowid DESC LIMIT 1",
            Self::select_with_sender()
        );

        let message = sqlx::query_as::<_, MessageWithSender>(&sql)
            .bind(conversation_id)
            .fetch_optional(executor)
            .await?;

        Ok(message)
    }

    /// Page through a conversation ordered by (created_at, insertion order).
    ///
    /// Without a cursor the newest `limit` messages are returned. The cursor
    /// message must exist in the conversation; callers check this first.
    pub async fn list_page(
        pool: &SqlitePool,
        conversation_id: &str,
        page: &PageRequest,
    ) -> Result<MessagePage, AppError> {
        const CURSOR: &str = "(SELECT created_at, rowid FROM messages WHERE id = ?)";

        let (filter, newest_first) = match &page.cursor {
            None => (String::new(), true),
            Some(Cursor::Before(_)) => (format!("AND (m.created_at, m.rowid) < {CURSOR}"), true),
            Some(Cursor::After(_)) => (format!("AND (m.created_at, m.rowid) > {CURSOR}"), false),
        };
        let order = if newest_first { "DESC" } else { "ASC" };

        let sql = format!(
            "{} WHERE m.conversation_id = ? {} ORDER BY m.created_at {order}, m.rowid {order} LIMIT ?",
            Self::select_with_sender(),
            filter,
        );

        let mut query = sqlx::query_as::<_, MessageWithSender>(&sql).bind(conversation_id);
        if let Some(Cursor::Before(id) | Cursor::After(id)) = &page.cursor {
            query = query.bind(id);
        }

        // One extra row tells us whether another page exists
        let mut messages = query.bind(page.limit + 1).fetch_all(pool).await?;

        let has_more = messages.len() as i64 > page.limit;
        messages.truncate(page.limit as usize);
        if newest_first {
            messages.reverse();
        }

        Ok(MessagePage { messages, has_more })
    }

    pub async fn unread_count(
        executor: impl SqliteExecutor<'_>,
        conversation_id: &str,
        user_id: i64,
    ) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
SELECT COUNT(*)
FROM message_status ms
JOIN messages m ON m.id = ms.message_id
WHERE m.conversation_id = ? AND ms.user_id = ? AND ms.status = ?
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(MessageState::Sent)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Flip the user's `sent` statuses in the conversation to `read`
    pub async fn mark_read(
        executor: impl SqliteExecutor<'_>,
        conversation_id: &str,
        user_id: i64,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
UPDATE message_status
SET status = ?, updated_at = ?
WHERE user_id = ? AND status = ?
  AND message_id IN (SELECT id FROM messages WHERE conversation_id = ?)
            "#,
        )
        .bind(MessageState::Read)
        .bind(now_millis())
        .bind(user_id)
        .bind(MessageState::Sent)
        .bind(conversation_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::db::{Conversation, ConversationRepository, NewConversation};

    async fn direct(pool: &SqlitePool, a: i64, b: i64) -> Conversation {
        ConversationRepository::create_or_get_direct(
            pool,
            NewConversation {
                creator_id: a,
                is_group: false,
                name: None,
                avatar_url: None,
                participant_ids: vec![b],
            },
        )
        .await
        .unwrap()
        .0
    }

    fn text(conversation_id: &str, sender_id: i64, content: &str) -> NewMessage {
        NewMessage {
            conversation_id: conversation_id.to_string(),
            sender_id,
            content: content.to_string(),
            message_type: "text".to_string(),
            file_url: None,
            file_name: None,
            file_size: None,
            reply_to: None,
        }
    }

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(None, None).limit, 50);
        assert_eq!(PageRequest::new(Some(0), None).limit, 1);
        assert_eq!(PageRequest::new(Some(1000), None).limit, 100);
    }

    #[tokio::test]
    async fn test_create_joins_sender_and_bumps_conversation() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;
        let (bob, _) = test_support::user(&pool, "bob").await;
        let conv = direct(&pool, alice.id, bob.id).await;

        let msg = MessageRepository::create(&pool, text(&conv.id, alice.id, "hello")).await.unwrap();
        assert_eq!(msg.message.sender_id, alice.id);
        assert_eq!(msg.sender.username, "alice");
        assert_eq!(msg.message.message_type, "text");

        let refreshed = ConversationRepository::get_by_id(&pool, &conv.id).await.unwrap().unwrap();
        assert_eq!(refreshed.updated_at, msg.message.created_at);

        let latest = MessageRepository::latest(&pool, &conv.id).await.unwrap().unwrap();
        assert_eq!(latest.message.id, msg.message.id);
    }

    #[tokio::test]
    async fn test_pages_are_disjoint_and_ordered() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;
        let (bob, _) = test_support::user(&pool, "bob").await;
        let conv = direct(&pool, alice.id, bob.id).await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let msg = MessageRepository::create(&pool, text(&conv.id, alice.id, &format!("m{i}")))
                .await
                .unwrap();
            ids.push(msg.message.id);
        }

        let newest = MessageRepository::list_page(&pool, &conv.id, &PageRequest::new(Some(2), None))
            .await
            .unwrap();
        let contents: Vec<_> = newest.messages.iter().map(|m| m.message.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
        assert!(newest.has_more);

        let older = MessageRepository::list_page(
            &pool,
            &conv.id,
            &PageRequest::new(Some(10), Some(Cursor::Before(ids[3].clone()))),
        )
        .await
        .unwrap();
        let contents: Vec<_> = older.messages.iter().map(|m| m.message.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2"]);
        assert!(!older.has_more);

        let newer = MessageRepository::list_page(
            &pool,
            &conv.id,
            &PageRequest::new(Some(1), Some(Cursor::After(ids[2].clone()))),
        )
        .await
        .unwrap();
        let contents: Vec<_> = newer.messages.iter().map(|m| m.message.content.as_str()).collect();
        assert_eq!(contents, vec!["m3"]);
        assert!(newer.has_more);

        let all = MessageRepository::list_page(&pool, &conv.id, &PageRequest::new(None, None))
            .await
            .unwrap();
        assert!(all
            .messages
            .windows(2)
            .all(|w| w[0].message.created_at <= w[1].message.created_at));
    }

    #[tokio::test]
    async fn test_unread_and_mark_read() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;
        let (bob, _) = test_support::user(&pool, "bob").await;
        let conv = direct(&pool, alice.id, bob.id).await;

        MessageRepository::create(&pool, text(&conv.id, alice.id, "one")).await.unwrap();
        MessageRepository::create(&pool, text(&conv.id, alice.id, "two")).await.unwrap();

        assert_eq!(MessageRepository::unread_count(&pool, &conv.id, bob.id).await.unwrap(), 2);
        assert_eq!(MessageRepository::unread_count(&pool, &conv.id, alice.id).await.unwrap(), 0);

        assert_eq!(MessageRepository::mark_read(&pool, &conv.id, bob.id).await.unwrap(), 2);
        assert_eq!(MessageRepository::unread_count(&pool, &conv.id, bob.id).await.unwrap(), 0);
        assert_eq!(MessageRepository::mark_read(&pool, &conv.id, bob.id).await.unwrap(), 0);
    }
}
