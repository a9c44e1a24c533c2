use sqlx::{SqliteExecutor, SqlitePool};
use crate::db::models::{User, UserWithProfile, prefixed_profile_columns};
use crate::db::now_millis;
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        executor: impl SqliteExecutor<'_>,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let now = now_millis();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (email, password_hash, created_at, updated_at)
VALUES (?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }

    pub async fn get_by_email(
        executor: impl SqliteExecutor<'_>,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(executor)
            .await?;

        Ok(user)
    }

    pub async fn get_by_id(
        executor: impl SqliteExecutor<'_>,
        id: i64,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(user)
    }

    /// Ids from `ids` that have no user row
    pub async fn missing_ids(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<i64>, AppError> {
        let mut missing = Vec::new();
        for &id in ids {
            if Self::get_by_id(pool, id).await?.is_none() {
                missing.push(id);
            }
        }
        Ok(missing)
    }

    pub async fn update_email(
        executor: impl SqliteExecutor<'_>,
        id: i64,
        email: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET email = ?, updated_at = ? WHERE id = ?")
            .bind(email)
            .bind(now_millis())
            .bind(id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Case-insensitive substring match on email, excluding the caller
    pub async fn search_by_email(
        pool: &SqlitePool,
        caller_id: i64,
        query: &str,
        limit: i64,
    ) -> Result<Vec<UserWithProfile>, AppError> {
        let escaped = query
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");

        let sql = format!(
            r#"
SELECT u.id AS user_id, u.email AS user_email, NULL AS is_contact, {}
FROM users u
JOIN profiles p ON p.user_id = u.id
WHERE u.id <> ? AND lower(u.email) LIKE ? ESCAPE '\'
ORDER BY u.email ASC
LIMIT ?
            "#,
            prefixed_profile_columns("p", "profile_")
        );

        let users = sqlx::query_as::<_, UserWithProfile>(&sql)
            .bind(caller_id)
            .bind(format!("%{}%", escaped))
            .bind(limit)
            .fetch_all(pool)
            .await?;

        Ok(users)
    }

    /// Every other user, flagged with whether the caller already has them as a contact
    pub async fn list_directory(
        pool: &SqlitePool,
        caller_id: i64,
    ) -> Result<Vec<UserWithProfile>, AppError> {
        let sql = format!(
            r#"
SELECT u.id AS user_id, u.email AS user_email,
       EXISTS (
           SELECT 1 FROM contacts c
           WHERE c.user_id = ? AND c.contact_id = u.id AND c.status = 'accepted'
       ) AS is_contact,
       {}
FROM users u
JOIN profiles p ON p.user_id = u.id
WHERE u.id <> ?
ORDER BY p.username ASC
            "#,
            prefixed_profile_columns("p", "profile_")
        );

        let users = sqlx::query_as::<_, UserWithProfile>(&sql)
            .bind(caller_id)
            .bind(caller_id)
            .fetch_all(pool)
            .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::db::{ContactRepository, ContactStatus, ProfileRepository};

    #[tokio::test]
    async fn test_create_and_lookup() {
        let pool = test_support::pool().await;

        let user = UserRepository::create(&pool, "a@example.com", "hash").await.unwrap();
        assert!(user.id > 0);

        let by_email = UserRepository::get_by_email(&pool, "a@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(UserRepository::get_by_id(&pool, user.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let pool = test_support::pool().await;

        UserRepository::create(&pool, "a@example.com", "hash").await.unwrap();
        let err = UserRepository::create(&pool, "a@example.com", "hash").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_profile() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(alice.id)
            .execute(&pool)
            .await
            .unwrap();
        assert!(ProfileRepository::get_by_user_id(&pool, alice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_excludes_caller_and_escapes() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;
        test_support::user(&pool, "alfred").await;
        test_support::user(&pool, "bob").await;

        let found = UserRepository::search_by_email(&pool, alice.id, "AL", 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].profile.username, "alfred");
        assert_eq!(found[0].is_contact, None);

        let none = UserRepository::search_by_email(&pool, alice.id, "%", 20).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_directory_flags_contacts() {
        let pool = test_support::pool().await;
        let (alice, _) = test_support::user(&pool, "alice").await;
        let (bob, _) = test_support::user(&pool, "bob").await;
        test_support::user(&pool, "carol").await;

        ContactRepository::create(&pool, alice.id, bob.id, ContactStatus::Accepted)
            .await
            .unwrap();

        let entries = UserRepository::list_directory(&pool, alice.id).await.unwrap();
        let flags: Vec<(&str, Option<bool>)> = entries
            .iter()
            .map(|e| (e.profile.username.as_str(), e.is_contact))
            .collect();
        assert_eq!(flags, vec![("bob", Some(true)), ("carol", Some(false))]);
    }
}
