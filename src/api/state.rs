use std::sync::Arc;
use sqlx::{Pool, Sqlite};
use crate::config::Config;
use crate::crypto::{CredentialVerifier, JwtVerifier};

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed by HS256 JWTs signed with `config.jwt_secret`
    pub fn new(db: Pool<Sqlite>, config: Config) -> Self {
        let credentials = JwtVerifier::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::days(config.token_expiry_days),
        );

        Self {
            db,
            credentials: Arc::new(credentials),
            config: Arc::new(config),
        }
    }
}
