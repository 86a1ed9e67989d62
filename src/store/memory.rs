use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{CredentialStore, NewUser, User};
use crate::error::DatabaseError;

/// Process-local credential store.
///
/// Every operation takes the lock once, so `create` checks both unique keys
/// and inserts atomically, and `swap_refresh_token` is a true compare-and-swap.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<Uuid, User>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write operations issued (creates and refresh-token updates)
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail as if the backing database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>, DatabaseError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DatabaseError::ConnectionPool("store unavailable".to_string()));
        }
        self.users
            .lock()
            .map_err(|_| DatabaseError::UnexpectedError("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, DatabaseError> {
        let users = self.lock()?;
        Ok(users
            .values()
            .find(|u| {
                username.map_or(false, |name| u.username == name)
                    || email.map_or(false, |mail| u.email == mail)
            })
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut users = self.lock()?;
        if users.values().any(|u| u.username == user.username) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "users_username_key".to_string(),
            ));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "users_email_key".to_string(),
            ));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            fullname: user.fullname,
            avatar: user.avatar,
            cover_image: user.cover_image,
            password_hash: user.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool, DatabaseError> {
        let mut users = self.lock()?;
        let matched = match users.get_mut(&id) {
            Some(user) => {
                user.refresh_token = token.map(str::to_string);
                user.updated_at = Utc::now();
                true
            }
            None => false,
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(matched)
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, DatabaseError> {
        let mut users = self.lock()?;
        let swapped = match users.get_mut(&id) {
            Some(user) if user.refresh_token.as_deref() == Some(expected) => {
                user.refresh_token = Some(replacement.to_string());
                user.updated_at = Utc::now();
                true
            }
            _ => false,
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(swapped)
    }
}
