//! Persistent user directory
//!
//! Users are keyed by chat id. The engine only reads and writes them through
//! [`UserDirectory`].

pub mod r2;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

pub use r2::R2Directory;

/// Errors that can occur during directory operations
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// Update of a user that does not exist
    #[error("user {0} not found")]
    NotFound(i64),
    /// Create of a user that already exists
    #[error("user {0} already exists")]
    Conflict(i64),
    /// Storage backend failure
    #[error("backend error: {0}")]
    Backend(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Configuration error (missing credentials, etc.)
    #[error("configuration error: {0}")]
    Config(String),
}

/// Registered bot user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub chat_id: i64,
    pub name: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New user created now
    #[must_use]
    pub fn new(chat_id: i64, name: impl Into<String>, phone_number: Option<String>) -> Self {
        Self {
            chat_id,
            name: name.into(),
            phone_number,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` if the user has shared a phone number
    #[must_use]
    pub fn has_phone(&self) -> bool {
        self.phone_number
            .as_deref()
            .is_some_and(|phone| !phone.is_empty())
    }
}

/// Interface for user directory backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by chat id
    async fn find_by_chat_id(&self, chat_id: i64) -> Result<Option<User>, DirectoryError>;
    /// Create a user; fails with `Conflict` if one exists
    async fn create(&self, user: User) -> Result<User, DirectoryError>;
    /// Replace an existing user; fails with `NotFound` if absent
    async fn update(&self, user: User) -> Result<(), DirectoryError>;
    /// Delete a user; deleting an absent user succeeds
    async fn delete_by_chat_id(&self, chat_id: i64) -> Result<(), DirectoryError>;
    /// All users ordered by chat id
    async fn list_all(&self) -> Result<Vec<User>, DirectoryError>;
}

/// Process-local directory used when no persistent backend is configured
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<i64, User>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory pre-populated with `users`
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|user| (user.chat_id, user)).collect()),
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_chat_id(&self, chat_id: i64) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.read().await.get(&chat_id).cloned())
    }

    async fn create(&self, user: User) -> Result<User, DirectoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.chat_id) {
            return Err(DirectoryError::Conflict(user.chat_id));
        }
        users.insert(user.chat_id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.chat_id) {
            Some(existing) => {
                *existing = user;
                Ok(())
            }
            None => Err(DirectoryError::NotFound(user.chat_id)),
        }
    }

    async fn delete_by_chat_id(&self, chat_id: i64) -> Result<(), DirectoryError> {
        self.users.write().await.remove(&chat_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>, DirectoryError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|user| user.chat_id);
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_find_update() {
        let directory = InMemoryDirectory::new();
        directory
            .create(User::new(1, "Ali", None))
            .await
            .expect("created");

        let mut user = directory
            .find_by_chat_id(1)
            .await
            .expect("lookup")
            .expect("present");
        assert!(!user.has_phone());

        user.phone_number = Some("+998901112233".into());
        directory.update(user).await.expect("updated");

        let stored = directory.find_by_chat_id(1).await.expect("lookup");
        assert!(stored.is_some_and(|user| user.has_phone()));
    }

    #[tokio::test]
    async fn test_create_conflict_and_update_missing() {
        let directory = InMemoryDirectory::new();
        directory
            .create(User::new(1, "Ali", None))
            .await
            .expect("created");

        assert!(matches!(
            directory.create(User::new(1, "Vali", None)).await,
            Err(DirectoryError::Conflict(1))
        ));
        assert!(matches!(
            directory.update(User::new(2, "Vali", None)).await,
            Err(DirectoryError::NotFound(2))
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_and_delete() {
        let directory = InMemoryDirectory::with_users([
            User::new(3, "C", None),
            User::new(1, "A", None),
            User::new(2, "B", None),
        ]);
        directory.delete_by_chat_id(2).await.expect("deleted");
        directory
            .delete_by_chat_id(99)
            .await
            .expect("absent delete is ok");

        let ids: Vec<i64> = directory
            .list_all()
            .await
            .expect("listed")
            .iter()
            .map(|user| user.chat_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
