use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use tokio::sync::OnceCell;

use crate::error::AppError;

/// Hash a password with Argon2id and a fresh random salt, returning the PHC string
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Crypto(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored PHC string
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Crypto(format!("Invalid stored hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Crypto(format!("Password verification failed: {}", e))),
    }
}

/// Argon2 is deliberately slow; keep it off the async workers.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

pub async fn verify_password_blocking(password: String, stored_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await?
}

/// Stand-in hash verified when no account matches, hashed on first use
static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

async fn dummy_hash() -> Result<&'static str, AppError> {
    DUMMY_HASH
        .get_or_try_init(|| hash_password_blocking("parley-no-such-account".to_string()))
        .await
        .map(String::as_str)
}

/// Verify against the account's hash, or against a throwaway hash when there is no account.
///
/// Both branches cost one Argon2 verification; the missing-account branch always yields `false`.
pub async fn verify_credentials(password: String, stored_hash: Option<String>) -> Result<bool, AppError> {
    match stored_hash {
        Some(hash) => verify_password_blocking(password, hash).await,
        None => {
            let hash = dummy_hash().await?.to_string();
            verify_password_blocking(password, hash).await?;
            Ok(false)
        }
    }
}
