pub mod password;
pub mod token;

pub use password::{
    hash_password, hash_password_blocking, verify_credentials, verify_password, verify_password_blocking,
};
pub use token::{AuthUser, Claims, CredentialVerifier, IssuedToken, JwtVerifier};
