//! Boundary validation for request fields. Every check runs before any write.

use crate::error::AppError;

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MAX_FULL_NAME_LENGTH: usize = 100;
pub const MAX_CONVERSATION_NAME_LENGTH: usize = 100;
pub const MAX_MESSAGE_LENGTH: usize = 4096;
pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_BIO_LENGTH: usize = 500;
pub const MAX_STATUS_LENGTH: usize = 100;

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Basic local@domain.tld check; returns the trimmed, lower-cased address
pub fn validate_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(invalid("Email is required"));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(invalid(format!("Email must be at most {} characters", MAX_EMAIL_LENGTH)));
    }

    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => return Err(invalid("Email must contain an @ symbol")),
    };

    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");

    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(invalid("Invalid email address"));
    }

    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(invalid(format!(
            "Password must be {}-{} characters",
            MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Usernames are 3-32 alphanumeric, underscore or hyphen characters, stored lower-cased
pub fn validate_username(username: &str) -> Result<String, AppError> {
    let trimmed = username.trim();

    if trimmed.len() < 3 || trimmed.len() > 32 {
        return Err(invalid("Username must be 3-32 characters"));
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(invalid("Username must be alphanumeric, underscore, or hyphen"));
    }

    Ok(trimmed.to_lowercase())
}

pub fn validate_full_name(full_name: &str) -> Result<String, AppError> {
    let trimmed = full_name.trim();
    if trimmed.is_empty() {
        return Err(invalid("Full name is required"));
    }
    check_length("Full name", trimmed, MAX_FULL_NAME_LENGTH)?;
    Ok(trimmed.to_string())
}

/// Trimmed optional text; empty input stays empty so callers can clear fields
pub fn validate_optional_text(field: &str, value: &str, max: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    check_length(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

pub fn validate_message_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(invalid("Message content cannot be empty"));
    }
    check_length("Message", content, MAX_MESSAGE_LENGTH)
}

/// Message type tags are short lower-case identifiers such as `text` or `image`
pub fn validate_message_type(message_type: &str) -> Result<String, AppError> {
    let tag = message_type.trim();
    let valid = !tag.is_empty()
        && tag.len() <= 32
        && tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

    if !valid {
        return Err(invalid("Invalid message type"));
    }
    Ok(tag.to_string())
}

pub fn validate_conversation_name(name: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    check_length("Conversation name", name, MAX_CONVERSATION_NAME_LENGTH)?;
    Ok(Some(name.to_string()))
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len > max {
        return Err(invalid(format!("{} must be at most {} characters ({} given)", field, max, len)));
    }
    Ok(())
}
