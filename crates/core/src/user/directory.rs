//! User directory trait
//!
//! Defines the interface for user storage operations.

use async_trait::async_trait;
use thiserror::Error;

use super::model::{ProfileUpdate, UserRecord, UserUpsert};

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Repository interface for user records
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create or update the record keyed by `phone_number`.
    ///
    /// Numbers match on their digits alone, so formatting differences map
    /// to the same record. Implementations must make this atomic: concurrent
    /// calls for the same phone number produce exactly one record.
    async fn upsert_by_phone_number(
        &self,
        phone_number: &str,
        upsert: UserUpsert,
    ) -> DirectoryResult<UserRecord>;

    /// Get a user by phone number, matching on digits
    async fn find_by_phone_number(&self, phone_number: &str) -> DirectoryResult<Option<UserRecord>>;

    /// Get a user by stable ID
    async fn find_by_stable_id(&self, stable_id: &str) -> DirectoryResult<Option<UserRecord>>;

    /// Update profile fields of the user owning `stable_id`
    async fn update_profile(
        &self,
        stable_id: &str,
        update: ProfileUpdate,
    ) -> DirectoryResult<UserRecord>;
}
