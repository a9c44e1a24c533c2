use sqlx::SqliteExecutor;
use crate::db::models::Profile;
use crate::db::{new_id, now_millis};
use crate::error::AppError;

/// Partial profile update; `None` leaves a field untouched and an empty
/// string clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub status: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.full_name.is_none()
            && self.avatar_url.is_none()
            && self.bio.is_none()
            && self.status.is_none()
    }

    pub fn apply(&self, profile: &mut Profile) {
        fn merge(target: &mut Option<String>, change: &Option<String>) {
            if let Some(value) = change {
                *target = Some(value.clone()).filter(|v| !v.is_empty());
            }
        }

        if let Some(username) = &self.username {
            profile.username = username.clone();
        }
        merge(&mut profile.full_name, &self.full_name);
        merge(&mut profile.avatar_url, &self.avatar_url);
        merge(&mut profile.bio, &self.bio);
        merge(&mut profile.status, &self.status);
    }
}

pub struct ProfileRepository;

impl ProfileRepository {
    pub async fn create(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
        username: &str,
        full_name: Option<&str>,
    ) -> Result<Profile, AppError> {
        let now = now_millis();

        let profile = sqlx::query_as::<_, Profile>(
            r#"
INSERT INTO profiles (id, user_id, username, full_name, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(username)
        .bind(full_name)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?;

        Ok(profile)
    }

    pub async fn get_by_user_id(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
    ) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(executor)
            .await?;

        Ok(profile)
    }

    pub async fn get_by_username(
        executor: impl SqliteExecutor<'_>,
        username: &str,
    ) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE username = ?")
            .bind(username)
            .fetch_optional(executor)
            .await?;

        Ok(profile)
    }

    /// Persist every mutable column of `profile`
    pub async fn save(
        executor: impl SqliteExecutor<'_>,
        profile: &Profile,
    ) -> Result<Profile, AppError> {
        let saved = sqlx::query_as::<_, Profile>(
            r#"
UPDATE profiles
SET username = ?, full_name = ?, avatar_url = ?, bio = ?, status = ?, updated_at = ?
WHERE user_id = ?
RETURNING *
            "#,
        )
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(&profile.bio)
        .bind(&profile.status)
        .bind(now_millis())
        .bind(profile.user_id)
        .fetch_one(executor)
        .await?;

        Ok(saved)
    }

    pub async fn touch_last_seen(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE profiles SET last_seen = ? WHERE user_id = ?")
            .bind(now_millis())
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(())
    }
}
