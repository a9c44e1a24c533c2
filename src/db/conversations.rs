use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use crate::db::messages::MessageRepository;
use crate::db::models::{Conversation, ConversationDetails, ConversationSummary, Participant};
use crate::db::{begin_immediate, new_id, now_millis};
use crate::error::AppError;

/// Validated input for a new conversation. `participant_ids` never contains the creator.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub creator_id: i64,
    pub is_group: bool,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub participant_ids: Vec<i64>,
}

pub struct ConversationRepository;

impl ConversationRepository {
    /// Create a conversation and its memberships atomically.
    ///
    /// A direct (non-group) request with exactly one other participant first
    /// looks for an existing direct conversation between the pair and returns
    /// it instead. The flag is `true` when a new row was created.
    pub async fn create_or_get_direct(
        pool: &SqlitePool,
        new: NewConversation,
    ) -> Result<(Conversation, bool), AppError> {
        // Dedup lookup and insert must not interleave with another creator
        let mut tx = begin_immediate(pool).await?;

        if !new.is_group {
            if let &[other_id] = new.participant_ids.as_slice() {
                if let Some(existing) = Self::find_direct_between(&mut *tx, new.creator_id, other_id).await? {
                    tracing::debug!("Reusing direct conversation {}", existing.id);
                    tx.commit().await?;
                    return Ok((existing, false));
                }
            }
        }

        let conversation = Self::insert(&mut *tx, &new).await?;
        Self::add_participant(&mut *tx, &conversation.id, new.creator_id).await?;
        for &user_id in &new.participant_ids {
            Self::add_participant(&mut *tx, &conversation.id, user_id).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Created conversation {} with {} participants",
            conversation.id,
            new.participant_ids.len() + 1
        );
        Ok((conversation, true))
    }

    async fn insert(conn: &mut SqliteConnection, new: &NewConversation) -> Result<Conversation, AppError> {
        let now = now_millis();

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
INSERT INTO conversations (id, name, is_group, avatar_url, created_by, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&new.name)
        .bind(new.is_group)
        .bind(&new.avatar_url)
        .bind(new.creator_id)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(conversation)
    }

    /// Adds `user_id`, re-activating a membership that was left earlier
    pub async fn add_participant(
        conn: &mut SqliteConnection,
        conversation_id: &str,
        user_id: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
INSERT INTO conversation_participants (id, conversation_id, user_id, joined_at)
VALUES (?, ?, ?, ?)
ON CONFLICT (conversation_id, user_id) DO UPDATE SET left_at = NULL
            "#,
        )
        .bind(new_id())
        .bind(conversation_id)
        .bind(user_id)
        .bind(now_millis())
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Oldest non-group conversation whose active members are exactly `a` and `b`
    pub async fn find_direct_between(
        executor: impl SqliteExecutor<'_>,
        a: i64,
        b: i64,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
SELECT c.*
FROM conversations c
JOIN conversation_participants pa
    ON pa.conversation_id = c.id AND pa.user_id = ? AND pa.left_at IS NULL
JOIN conversation_participants pb
    ON pb.conversation_id = c.id AND pb.user_id = ? AND pb.left_at IS NULL
WHERE c.is_group = 0
  AND (
      SELECT COUNT(*) FROM conversation_participants p
      WHERE p.conversation_id = c.id AND p.left_at IS NULL
  ) = 2
ORDER BY c.created_at ASC
LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(executor)
        .await?;

        Ok(conversation)
    }

    pub async fn get_by_id(
        executor: impl SqliteExecutor<'_>,
        id: &str,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(conversation)
    }

    pub async fn is_active_participant(
        executor: impl SqliteExecutor<'_>,
        conversation_id: &str,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let found: Option<(i64,)> = sqlx::query_as(
            r#"
SELECT 1 FROM conversation_participants
WHERE conversation_id = ? AND user_id = ? AND left_at IS NULL
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(found.is_some())
    }

    /// Active participants with their profiles, in join order
    pub async fn participants(
        executor: impl SqliteExecutor<'_>,
        conversation_id: &str,
    ) -> Result<Vec<Participant>, AppError> {
        let participants = sqlx::query_as::<_, Participant>(
            r#"
SELECT p.*, cp.joined_at
FROM conversation_participants cp
JOIN profiles p ON p.user_id = cp.user_id
WHERE cp.conversation_id = ? AND cp.left_at IS NULL
ORDER BY cp.joined_at ASC, cp.rowid ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(executor)
        .await?;

        Ok(participants)
    }

    /// Conversations the user actively belongs to, most recently updated first
    pub async fn list_for_user(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
    ) -> Result<Vec<Conversation>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
SELECT c.*
FROM conversations c
JOIN conversation_participants cp ON cp.conversation_id = c.id
WHERE cp.user_id = ? AND cp.left_at IS NULL
ORDER BY c.updated_at DESC, c.rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(conversations)
    }

    pub async fn touch(
        executor: impl SqliteExecutor<'_>,
        conversation_id: &str,
        updated_at: i64,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(updated_at)
            .bind(conversation_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn details(
        pool: &SqlitePool,
        conversation: Conversation,
        viewer_id: i64,
    ) -> Result<ConversationDetails, AppError> {
        let participants = Self::participants(pool, &conversation.id).await?;
        let display_name =
            conversation.display_name_for(participants.iter().map(|p| &p.profile), viewer_id);

        Ok(ConversationDetails {
            conversation,
            display_name,
            participants,
        })
    }

    /// Conversation list for `user_id`, each with members, latest message and unread count
    pub async fn summaries_for_user(
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let conversations = Self::list_for_user(pool, user_id).await?;
        let mut summaries = Vec::with_capacity(conversations.len());

        for conversation in conversations {
            let participants: Vec<_> = Self::participants(pool, &conversation.id)
                .await?
                .into_iter()
                .map(|p| p.profile)
                .collect();
            let last_message = MessageRepository::latest(pool, &conversation.id).await?;
            let unread_count = MessageRepository::unread_count(pool, &conversation.id, user_id).await?;
            let display_name = conversation.display_name_for(&participants, user_id);

            summaries.push(ConversationSummary {
                conversation,
                display_name,
                participants,
                last_message,
                unread_count,
            });
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn direct(creator_id: i64, other: i64) -> NewConversation {
        NewConversation {
            creator_id,
            is_group: false,
            name: None,
            avatar_url: None,
            participant_ids: vec![other],
        }
    }

    #[tokio::test]
    async fn test_direct_conversation_dedup() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;
        let (bob, _) = test_support::user(&pool, "bob").await;

        let (first, created) = ConversationRepository::create_or_get_direct(&pool, direct(alice.id, bob.id))
            .await
            .unwrap();
        assert!(created);

        // Same pair from the other side resolves to the same conversation
        let (second, created) = ConversationRepository::create_or_get_direct(&pool, direct(bob.id, alice.id))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_group_never_dedups() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;
        let (bob, _) = test_support::user(&pool, "bob").await;
        let (direct_conv, _) = ConversationRepository::create_or_get_direct(&pool, direct(alice.id, bob.id))
            .await
            .unwrap();

        let group = NewConversation {
            creator_id: alice.id,
            is_group: true,
            name: Some("Pair".to_string()),
            avatar_url: None,
            participant_ids: vec![bob.id],
        };
        let (group_conv, created) = ConversationRepository::create_or_get_direct(&pool, group)
            .await
            .unwrap();
        assert!(created);
        assert_ne!(group_conv.id, direct_conv.id);

        // A group with the same two members is not a direct match
        let found = ConversationRepository::find_direct_between(&pool, alice.id, bob.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, direct_conv.id);
    }

    #[tokio::test]
    async fn test_creator_is_participant() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;
        let (bob, _) = test_support::user(&pool, "bob").await;
        let (carol, _) = test_support::user(&pool, "carol").await;

        let (conv, _) = ConversationRepository::create_or_get_direct(
            &pool,
            NewConversation {
                creator_id: alice.id,
                is_group: true,
                name: Some("Team".to_string()),
                avatar_url: None,
                participant_ids: vec![bob.id, carol.id],
            },
        )
        .await
        .unwrap();

        let members: Vec<i64> = ConversationRepository::participants(&pool, &conv.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.profile.user_id)
            .collect();
        assert_eq!(members, vec![alice.id, bob.id, carol.id]);
        assert_eq!(conv.created_by, Some(alice.id));
        assert!(ConversationRepository::is_active_participant(&pool, &conv.id, carol.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_participant_insert_rolls_back() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;

        // Unknown user id violates the foreign key after the conversation row is written
        let result = ConversationRepository::create_or_get_direct(&pool, direct(alice.id, 9999)).await;
        assert!(result.is_err());

        let conversations = ConversationRepository::list_for_user(&pool, alice.id).await.unwrap();
        assert!(conversations.is_empty());
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_list_excludes_left_conversations() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;
        let (bob, _) = test_support::user(&pool, "bob").await;

        let (conv, _) = ConversationRepository::create_or_get_direct(&pool, direct(alice.id, bob.id))
            .await
            .unwrap();
        sqlx::query("UPDATE conversation_participants SET left_at = 1 WHERE user_id = ?")
            .bind(bob.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(ConversationRepository::list_for_user(&pool, bob.id).await.unwrap().is_empty());
        assert!(!ConversationRepository::is_active_participant(&pool, &conv.id, bob.id).await.unwrap());
        assert_eq!(ConversationRepository::list_for_user(&pool, alice.id).await.unwrap().len(), 1);
    }
}
