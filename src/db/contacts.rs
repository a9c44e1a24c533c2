use sqlx::SqliteExecutor;
use crate::db::models::{prefixed_profile_columns, Contact, ContactStatus, ContactWithProfile};
use crate::db::{new_id, now_millis};
use crate::error::AppError;

pub struct ContactRepository;

impl ContactRepository {
    pub async fn create(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
        contact_id: i64,
        status: ContactStatus,
    ) -> Result<Contact, AppError> {
        let now = now_millis();

        let contact = sqlx::query_as::<_, Contact>(
            r#"
INSERT INTO contacts (id, user_id, contact_id, status, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(contact_id)
        .bind(status)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?;

        Ok(contact)
    }

    pub async fn get(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
        contact_id: i64,
    ) -> Result<Option<Contact>, AppError> {
        let contact = sqlx::query_as::<_, Contact>(
            "SELECT * FROM contacts WHERE user_id = ? AND contact_id = ?",
        )
        .bind(user_id)
        .bind(contact_id)
        .fetch_optional(executor)
        .await?;

        Ok(contact)
    }

    /// Accepted edges from `user_id` with the counterpart's profile, newest first
    pub async fn list_accepted(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
    ) -> Result<Vec<ContactWithProfile>, AppError> {
        let sql = format!(
            r#"
SELECT c.*, {}
FROM contacts c
JOIN profiles cp ON cp.user_id = c.contact_id
WHERE c.user_id = ? AND c.status = ?
ORDER BY c.created_at DESC, c.rowid DESC
            "#,
            prefixed_profile_columns("cp", "contact_profile_")
        );

        let contacts = sqlx::query_as::<_, ContactWithProfile>(&sql)
            .bind(user_id)
            .bind(ContactStatus::Accepted)
            .fetch_all(executor)
            .await?;

        Ok(contacts)
    }
}
