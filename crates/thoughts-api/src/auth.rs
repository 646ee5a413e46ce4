use std::sync::Arc;

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use rand_core::OsRng;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use thoughts_db::Database;
use thoughts_types::api::Claims;

/// Fixed salt for hashing against when the login email is unknown.
const UNKNOWN_USER_SALT: &str = "dGhvdWdodHMtbm8tdXNlcg";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub credentials: Credentials,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// Password hashing and session token signing. Holds no per-user state;
/// tokens are verified from their signature alone.
pub struct Credentials {
    secret: String,
    token_ttl: Duration,
    hasher: Argon2<'static>,
}

impl Credentials {
    pub fn new(secret: impl Into<String>, token_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            token_ttl,
            hasher: Argon2::default(),
        }
    }

    /// Swap the Argon2 instance, e.g. for cheaper parameters.
    pub fn with_hasher(mut self, hasher: Argon2<'static>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Hash with Argon2id and a fresh random salt.
    pub fn hash_password(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
        Ok(hash.to_string())
    }

    /// False on mismatch. A stored hash that cannot be parsed also counts as
    /// a mismatch; the caller decides what to tell the user.
    pub fn verify_password(&self, plain: &str, stored_hash: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Unparseable password hash in store: {}", e);
                return false;
            }
        };

        self.hasher
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    /// Burn the same Argon2 work as a real verification for a login whose
    /// email matched nobody. Always false.
    pub fn verify_unknown_user(&self, plain: &str) -> bool {
        let salt = match SaltString::from_b64(UNKNOWN_USER_SALT) {
            Ok(salt) => salt,
            Err(e) => {
                warn!("Bad unknown-user salt: {}", e);
                return false;
            }
        };

        if let Err(e) = self.hasher.hash_password(plain.as_bytes(), &salt) {
            warn!("Unknown-user hash failed: {}", e);
        }
        false
    }

    pub fn issue_token(&self, user_id: Uuid, username: &str, email: &str) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            email: email.to_string(),
            exp: (Utc::now() + self.token_ttl).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Check signature and expiry and hand back the embedded identity.
    pub fn authenticate(&self, token: &str) -> Result<Claims, CredentialError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => CredentialError::Expired,
            _ => CredentialError::Invalid(e),
        })
    }
}
