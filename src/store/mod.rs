/// Credential Store
///
/// Persists user records and the single `refresh_token` session pointer.
/// The store owns uniqueness of `username` and `email`: `create` reports a
/// violation as `DatabaseError::UniqueConstraintViolation` rather than
/// trusting any check the caller made beforehand.

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;

/// Stored user aggregate
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    /// Empty when no cover image was supplied
    pub cover_image: String,
    pub password_hash: String,
    /// Most recently issued refresh token, `None` after logout
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a user record
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: String,
}

/// Sanitized user view: no password hash, no refresh token
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            fullname: user.fullname.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Finds the user whose username OR email matches; `None` arguments never match.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, DatabaseError>;

    async fn create(&self, user: NewUser) -> Result<User, DatabaseError>;

    /// Unconditionally overwrites the stored refresh token. Returns whether a user matched.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool, DatabaseError>;

    /// Replaces the stored refresh token only if it still equals `expected`.
    /// Returns `false` when the stored token changed in between.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, DatabaseError>;
}

#[cfg(test)]
pub(crate) fn test_user(username: &str, email: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        fullname: "Test User".to_string(),
        avatar: "https://media.test/avatar.png".to_string(),
        cover_image: String::new(),
        password_hash: "$2b$12$notarealhash".to_string(),
        refresh_token: Some("secret-refresh".to_string()),
        created_at: now,
        updated_at: now,
    }
}
