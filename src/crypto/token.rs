use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims: `sub` carries the numeric user id as a string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identity resolved from a verified credential, attached to each request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Issues and checks bearer credentials for every protected route
pub trait CredentialVerifier: Send + Sync {
    fn issue(&self, user_id: i64, email: &str) -> Result<IssuedToken, AppError>;

    fn verify(&self, token: &str) -> Result<AuthUser, AppError>;
}

/// HS256 JWT implementation of [`CredentialVerifier`]
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_in: Duration,
}

impl JwtVerifier {
    pub fn new(secret: &[u8], expires_in: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            expires_in,
        }
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Crypto(format!("Token signing failed: {}", e)))
    }
}

impl CredentialVerifier for JwtVerifier {
    fn issue(&self, user_id: i64, email: &str) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expires_in).timestamp(),
        };

        Ok(IssuedToken {
            token: self.encode_claims(&claims)?,
            expires_at: claims.exp,
        })
    }

    fn verify(&self, token: &str) -> Result<AuthUser, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Auth("Token expired".to_string()),
                _ => AppError::Auth("Invalid token".to_string()),
            }
        })?;

        let id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Auth("Invalid token".to_string()))?;

        Ok(AuthUser {
            id,
            email: data.claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(b"test-secret", Duration::days(7))
    }

    #[test]
    fn test_issue_verify() {
        let v = verifier();
        let issued = v.issue(42, "a@example.com").unwrap();

        let user = v.verify(&issued.token).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.email, "a@example.com");
        assert!(issued.expires_at > Utc::now().timestamp() + 6 * 24 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = verifier().issue(1, "a@example.com").unwrap();
        let other = JwtVerifier::new(b"other-secret", Duration::days(7));

        assert!(matches!(other.verify(&issued.token), Err(AppError::Auth(_))));
    }

    #[test]
    fn test_expired_rejected() {
        let v = verifier();
        let claims = Claims {
            sub: "1".to_string(),
            email: "a@example.com".to_string(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = v.encode_claims(&claims).unwrap();

        match v.verify(&token) {
            Err(AppError::Auth(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("expected expiry error, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(verifier().verify("not.a.jwt"), Err(AppError::Auth(_))));
    }
}
