pub mod models;
pub mod users;
pub mod profiles;
pub mod conversations;
pub mod messages;
pub mod contacts;

pub use models::{
    Contact, ContactStatus, ContactWithProfile, Conversation, ConversationDetails,
    ConversationSummary, Message, MessageState, MessageWithSender, Participant, Profile, User,
    UserInfo, UserWithProfile,
};
pub use users::UserRepository;
pub use profiles::{ProfileChanges, ProfileRepository};
pub use conversations::{ConversationRepository, NewConversation};
pub use messages::{Cursor, MessagePage, MessageRepository, NewMessage, PageRequest};
pub use contacts::ContactRepository;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::config::Config;
use crate::error::AppError;

/// Server-assigned timestamps are Unix epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Open the configured database with connection pooling and foreign keys enforced
pub async fn connect(config: &Config) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Single-connection in-memory database with the schema applied.
///
/// The connection is never recycled; an in-memory SQLite database lives
/// exactly as long as its connection.
pub async fn connect_in_memory() -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Write transaction that takes SQLite's write lock up front.
///
/// Read-then-write sequences inside it cannot interleave with another writer;
/// competing callers wait on the busy timeout instead of failing at commit.
pub async fn begin_immediate(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, AppError> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::models::{Profile, User};

    pub async fn pool() -> SqlitePool {
        connect_in_memory().await.unwrap()
    }

    /// Insert a user and profile directly; `name` seeds email and username
    pub async fn user(pool: &SqlitePool, name: &str) -> (User, Profile) {
        let mut tx = pool.begin().await.unwrap();
        let user = UserRepository::create(&mut *tx, &format!("{name}@example.com"), "$argon2id$stub")
            .await
            .unwrap();
        let profile = ProfileRepository::create(&mut *tx, user.id, name, Some(&name.to_uppercase()))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (user, profile)
    }
}
