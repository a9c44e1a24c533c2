use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Wire shape of a user: never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        UserInfo {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub user_id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub status: Option<String>,
    pub last_seen: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Profile {
    /// Name shown to other users: full name when set, username otherwise
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }

    /// Reads a profile whose columns were selected with `prefix` (e.g. `sender_profile_username`)
    pub(crate) fn from_prefixed_row(row: &SqliteRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let col = |name: &str| format!("{}{}", prefix, name);

        Ok(Profile {
            id: row.try_get(col("id").as_str())?,
            user_id: row.try_get(col("user_id").as_str())?,
            username: row.try_get(col("username").as_str())?,
            full_name: row.try_get(col("full_name").as_str())?,
            avatar_url: row.try_get(col("avatar_url").as_str())?,
            bio: row.try_get(col("bio").as_str())?,
            status: row.try_get(col("status").as_str())?,
            last_seen: row.try_get(col("last_seen").as_str())?,
            created_at: row.try_get(col("created_at").as_str())?,
            updated_at: row.try_get(col("updated_at").as_str())?,
        })
    }
}

/// SELECT list for a profile aliased under `prefix`, paired with `Profile::from_prefixed_row`
pub(crate) fn prefixed_profile_columns(table: &str, prefix: &str) -> String {
    [
        "id", "user_id", "username", "full_name", "avatar_url", "bio", "status", "last_seen",
        "created_at", "updated_at",
    ]
    .iter()
    .map(|c| format!("{table}.{c} AS {prefix}{c}"))
    .collect::<Vec<_>>()
    .join(", ")
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub name: Option<String>,
    pub is_group: bool,
    pub avatar_url: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Participant profile plus membership data
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: Profile,
    pub joined_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: i64,
    pub content: String,
    pub message_type: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub reply_to: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Message with its sender's profile joined
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithSender {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Profile,
}

impl<'r> FromRow<'r, SqliteRow> for MessageWithSender {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(MessageWithSender {
            message: Message::from_row(row)?,
            sender: Profile::from_prefixed_row(row, "sender_profile_")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageState {
    Sent,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ContactStatus {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub user_id: i64,
    pub contact_id: i64,
    pub status: ContactStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Contact edge with the counterpart's profile joined
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactWithProfile {
    #[serde(flatten)]
    pub contact: Contact,
    pub contact_profile: Profile,
}

impl<'r> FromRow<'r, SqliteRow> for ContactWithProfile {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(ContactWithProfile {
            contact: Contact::from_row(row)?,
            contact_profile: Profile::from_prefixed_row(row, "contact_profile_")?,
        })
    }
}

/// Directory entry returned by user search/listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserWithProfile {
    pub user: UserInfo,
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_contact: Option<bool>,
}

impl<'r> FromRow<'r, SqliteRow> for UserWithProfile {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(UserWithProfile {
            user: UserInfo {
                id: row.try_get("user_id")?,
                email: row.try_get("user_email")?,
            },
            profile: Profile::from_prefixed_row(row, "profile_")?,
            is_contact: row.try_get("is_contact")?,
        })
    }
}

impl Conversation {
    /// Title shown to `viewer_id`. Explicit names win; otherwise groups list the
    /// other members and direct chats show the counterpart.
    pub fn display_name_for<'a, I>(&self, participants: I, viewer_id: i64) -> String
    where
        I: IntoIterator<Item = &'a Profile>,
    {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        let others: Vec<&str> = participants
            .into_iter()
            .filter(|p| p.user_id != viewer_id)
            .map(Profile::display_name)
            .collect();

        match (self.is_group, others.first()) {
            (true, Some(_)) => others.join(", "),
            (true, None) => "Group".to_string(),
            (false, Some(other)) => other.to_string(),
            (false, None) => "Conversation".to_string(),
        }
    }
}

/// Conversation list entry for one viewer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub display_name: String,
    pub participants: Vec<Profile>,
    pub last_message: Option<MessageWithSender>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetails {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub display_name: String,
    pub participants: Vec<Participant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(user_id: i64, username: &str, full_name: Option<&str>) -> Profile {
        Profile {
            id: format!("p{user_id}"),
            user_id,
            username: username.to_string(),
            full_name: full_name.map(str::to_string),
            avatar_url: None,
            bio: None,
            status: None,
            last_seen: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn conversation(name: Option<&str>, is_group: bool) -> Conversation {
        Conversation {
            id: "c1".to_string(),
            name: name.map(str::to_string),
            is_group,
            avatar_url: None,
            created_by: Some(1),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_direct_display_name_is_counterpart() {
        let people = [profile(1, "alice", Some("Alice A")), profile(2, "bob", None)];
        let conv = conversation(None, false);

        assert_eq!(conv.display_name_for(&people, 1), "bob");
        assert_eq!(conv.display_name_for(&people, 2), "Alice A");
    }

    #[test]
    fn test_group_display_name() {
        let people = [
            profile(1, "alice", Some("Alice")),
            profile(2, "bob", Some("Bob")),
            profile(3, "carol", Some("  ")),
        ];

        assert_eq!(conversation(None, true).display_name_for(&people, 1), "Bob, carol");
        assert_eq!(conversation(Some("Team"), true).display_name_for(&people, 1), "Team");
        assert_eq!(conversation(Some(" "), true).display_name_for(&people[..1], 1), "Group");
    }

    #[test]
    fn test_user_serialization_hides_hash() {
        let user = User {
            id: 7,
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: 1,
            updated_at: 1,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["email"], "a@example.com");
    }

    #[test]
    fn test_message_with_sender_is_flat() {
        let msg = MessageWithSender {
            message: Message {
                id: "m1".to_string(),
                conversation_id: "c1".to_string(),
                sender_id: 1,
                content: "hi".to_string(),
                message_type: "text".to_string(),
                file_url: None,
                file_name: None,
                file_size: None,
                reply_to: None,
                created_at: 5,
                updated_at: 5,
            },
            sender: profile(1, "alice", None),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["conversationId"], "c1");
        assert_eq!(json["sender"]["username"], "alice");
    }
}
