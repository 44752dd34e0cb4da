// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Accounts and session tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Sessions are HS256 JWTs
//! carrying the username under `data.username`; the username is what the
//! connection guard keys member endpoints on.
//!
//! Argon2 hashing and verification run on the blocking pool.

use crate::config::AuthConfig;
use crate::store::{AccountStore, StoreError};
use crate::validator::{
    validate_password, validate_profile, validate_registration, ProfileEdit, Registration,
    ValidationError,
};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username repeated")]
    UsernameTaken,

    #[error("Username not exist")]
    UnknownUser,

    #[error("Password incorrect")]
    WrongPassword,

    #[error("Not logged in")]
    MissingToken,

    #[error("Session token invalid")]
    InvalidToken,

    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Session token could not be issued: {0}")]
    Issue(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
}

/// A registered marketplace member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Check `password` against the stored hash.
    pub async fn verify_password(&self, password: &str) -> Result<bool, AuthError> {
        let username = self.username.clone();
        let hash = self.password_hash.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!(username = %username, error = %e, "Stored password hash unreadable");
                false
            }
        })
        .await
        .map_err(|e| AuthError::Hashing(format!("Task join error: {e}")))
    }
}

async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hashing(format!("Task join error: {e}")))?
}

/// Validate and store a new account.
pub async fn register(
    store: &dyn AccountStore,
    form: &Registration<'_>,
    now: DateTime<Utc>,
) -> Result<Account, AuthError> {
    validate_registration(form)?;

    if store.find_account(form.username).await?.is_some() {
        return Err(AuthError::UsernameTaken);
    }

    let account = Account {
        username: form.username.to_string(),
        password_hash: hash_password(form.password).await?,
        display_name: form.display_name.to_string(),
        email: form.email.to_string(),
        phone: form.phone.to_string(),
        role: Role::User,
        created_at: now,
    };

    // A concurrent registration may have claimed the name since the lookup.
    if !store.insert_account(&account).await? {
        return Err(AuthError::UsernameTaken);
    }

    info!(username = %account.username, display_name = %account.display_name, "Account registered");
    Ok(account)
}

/// Verify credentials and return the account.
pub async fn login(
    store: &dyn AccountStore,
    username: &str,
    password: &str,
) -> Result<Account, AuthError> {
    let account = store
        .find_account(username)
        .await?
        .ok_or(AuthError::UnknownUser)?;
    if !account.verify_password(password).await? {
        return Err(AuthError::WrongPassword);
    }
    Ok(account)
}

/// Replace the editable profile fields of `account`.
pub async fn update_profile(
    store: &dyn AccountStore,
    account: &Account,
    edit: &ProfileEdit<'_>,
) -> Result<Account, AuthError> {
    validate_profile(edit)?;

    let updated = Account {
        display_name: edit.display_name.to_string(),
        email: edit.email.to_string(),
        phone: edit.phone.to_string(),
        ..account.clone()
    };
    if !store.update_account(&updated).await? {
        return Err(AuthError::UnknownUser);
    }

    info!(username = %updated.username, "Profile updated");
    Ok(updated)
}

/// Replace the password of `account` after checking the current one.
pub async fn change_password(
    store: &dyn AccountStore,
    account: &Account,
    old_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    if !account.verify_password(old_password).await? {
        warn!(username = %account.username, "Password change with wrong current password");
        return Err(AuthError::WrongPassword);
    }
    validate_password(new_password)?;

    let updated = Account {
        password_hash: hash_password(new_password).await?,
        ..account.clone()
    };
    if !store.update_account(&updated).await? {
        return Err(AuthError::UnknownUser);
    }

    info!(username = %updated.username, "Password changed");
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionData {
    username: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    exp: usize,
    iat: usize,
    data: SessionData,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct Sessions {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    lifetime: chrono::Duration,
}

impl Sessions {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            lifetime: chrono::Duration::days(config.jwt_expire_days),
        })
    }

    /// Token lifetime, used for the cookie max-age.
    pub fn lifetime(&self) -> chrono::Duration {
        self.lifetime
    }

    /// Sign a token for `username` valid from `now`.
    pub fn issue(&self, username: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            iss: self.issuer.clone(),
            exp: (now + self.lifetime).timestamp() as usize,
            iat: now.timestamp() as usize,
            data: SessionData {
                username: username.to_string(),
            },
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }

    /// Verify `token` and return the username it was issued for.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims.data.username)
            .map_err(|e| {
                warn!(error = %e, "Rejected session token");
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn sessions() -> Sessions {
        Sessions::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn form() -> Registration<'static> {
        Registration {
            username: "reader42",
            password: "correct horse",
            display_name: "Reader",
            email: "reader@example.com",
            phone: "0912345",
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let account = register(&store, &form(), Utc::now()).await.unwrap();
        assert_ne!(account.password_hash, "correct horse");
        assert_eq!(account.role, Role::User);

        let logged_in = login(&store, "reader42", "correct horse").await.unwrap();
        assert_eq!(logged_in.display_name, "Reader");
    }

    #[tokio::test]
    async fn test_duplicate_and_bad_credentials() {
        let store = MemoryStore::new();
        register(&store, &form(), Utc::now()).await.unwrap();

        let again = register(&store, &form(), Utc::now()).await;
        assert!(matches!(again, Err(AuthError::UsernameTaken)));

        let wrong = login(&store, "reader42", "battery staple").await;
        assert!(matches!(wrong, Err(AuthError::WrongPassword)));

        let unknown = login(&store, "nobody", "x").await;
        assert!(matches!(unknown, Err(AuthError::UnknownUser)));
    }

    #[tokio::test]
    async fn test_update_profile_keeps_credentials() {
        let store = MemoryStore::new();
        let account = register(&store, &form(), Utc::now()).await.unwrap();

        let edit = ProfileEdit {
            display_name: "Bookworm",
            email: "worm@example.com",
            phone: "0987654",
        };
        let updated = update_profile(&store, &account, &edit).await.unwrap();
        assert_eq!(updated.display_name, "Bookworm");
        assert_eq!(updated.password_hash, account.password_hash);

        let stored = login(&store, "reader42", "correct horse").await.unwrap();
        assert_eq!(stored.email, "worm@example.com");

        let bad = ProfileEdit {
            email: "worm.example.com",
            ..edit
        };
        assert!(matches!(
            update_profile(&store, &account, &bad).await,
            Err(AuthError::Invalid(ValidationError::InvalidEmail))
        ));
    }

    #[tokio::test]
    async fn test_change_password() {
        let store = MemoryStore::new();
        let account = register(&store, &form(), Utc::now()).await.unwrap();

        let wrong = change_password(&store, &account, "battery staple", "new secret").await;
        assert!(matches!(wrong, Err(AuthError::WrongPassword)));

        change_password(&store, &account, "correct horse", "new secret")
            .await
            .unwrap();
        assert!(matches!(
            login(&store, "reader42", "correct horse").await,
            Err(AuthError::WrongPassword)
        ));
        assert!(login(&store, "reader42", "new secret").await.is_ok());
    }

    #[test]
    fn test_token_round_trip() {
        let sessions = sessions();
        let token = sessions.issue("reader42", Utc::now()).unwrap();
        assert_eq!(sessions.verify(&token).unwrap(), "reader42");
    }

    #[test]
    fn test_expired_and_foreign_tokens_rejected() {
        let sessions = sessions();
        let old = sessions
            .issue("reader42", Utc::now() - chrono::Duration::days(30))
            .unwrap();
        assert!(matches!(sessions.verify(&old), Err(AuthError::InvalidToken)));

        let other = Sessions::new(&AuthConfig {
            jwt_secret: "other-secret".to_string(),
            ..Default::default()
        })
        .unwrap();
        let forged = other.issue("reader42", Utc::now()).unwrap();
        assert!(matches!(sessions.verify(&forged), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_missing_secret() {
        assert!(matches!(
            Sessions::new(&AuthConfig::default()),
            Err(AuthError::MissingSecret)
        ));
    }
}
