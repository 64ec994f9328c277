//! File-based user directory implementation
//!
//! Stores users as JSON in a file on disk. Every mutation holds the write
//! lock until the file has been rewritten, which makes upserts atomic for
//! callers sharing one store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::directory::{DirectoryError, DirectoryResult, UserDirectory};
use super::model::{ProfileUpdate, UserRecord, UserUpsert};
use crate::stable_id::normalize_phone_number;

/// File-based user directory using JSON
pub struct FileUserDirectory {
    /// Path to the JSON file
    path: PathBuf,
    /// In-memory cache of users
    cache: RwLock<HashMap<Uuid, UserRecord>>,
}

impl FileUserDirectory {
    /// Create a new FileUserDirectory
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> DirectoryResult<Self> {
        let path = path.into();
        let cache = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                let users: Vec<UserRecord> = serde_json::from_str(&content)?;
                users.into_iter().map(|u| (u.id, u)).collect()
            }
        } else {
            HashMap::new()
        };

        tracing::debug!(path = %path.display(), users = cache.len(), "user directory loaded");
        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Insert `record` and persist, rolling the cache back if the write fails
    async fn commit(
        &self,
        cache: &mut HashMap<Uuid, UserRecord>,
        record: UserRecord,
    ) -> DirectoryResult<UserRecord> {
        let previous = cache.insert(record.id, record.clone());
        if let Err(err) = persist(&self.path, cache).await {
            match previous {
                Some(previous) => {
                    cache.insert(previous.id, previous);
                }
                None => {
                    cache.remove(&record.id);
                }
            }
            tracing::error!(error = %err, "failed to persist user directory");
            return Err(err);
        }
        Ok(record)
    }

    /// All users in creation order
    #[cfg(test)]
    pub(crate) async fn list(&self) -> Vec<UserRecord> {
        let cache = self.cache.read().await;
        let mut users: Vec<UserRecord> = cache.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        users
    }
}

async fn persist(path: &Path, cache: &HashMap<Uuid, UserRecord>) -> DirectoryResult<()> {
    let mut users: Vec<&UserRecord> = cache.values().collect();
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let content = serde_json::to_string_pretty(&users)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, content).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

#[async_trait]
impl UserDirectory for FileUserDirectory {
    async fn upsert_by_phone_number(
        &self,
        phone_number: &str,
        upsert: UserUpsert,
    ) -> DirectoryResult<UserRecord> {
        let digits = normalize_phone_number(phone_number);
        let mut cache = self.cache.write().await;

        if let Some(owner) = cache.values().find(|u| {
            u.stable_id == upsert.stable_id && normalize_phone_number(&u.phone_number) != digits
        })
        {
            return Err(DirectoryError::Conflict(format!(
                "Stable ID {} already belongs to user {}",
                upsert.stable_id, owner.id
            )));
        }

        let record = match cache
            .values()
            .find(|u| normalize_phone_number(&u.phone_number) == digits)
        {
            Some(existing) => {
                let mut record = existing.clone();
                record.apply_upsert(upsert);
                tracing::debug!(user_id = %record.id, "updating user on verification");
                record
            }
            None => {
                let record = UserRecord::new(phone_number, upsert);
                tracing::debug!(user_id = %record.id, "creating user on first verification");
                record
            }
        };

        self.commit(&mut cache, record).await
    }

    async fn find_by_phone_number(&self, phone_number: &str) -> DirectoryResult<Option<UserRecord>> {
        let digits = normalize_phone_number(phone_number);
        let cache = self.cache.read().await;
        Ok(cache
            .values()
            .find(|u| normalize_phone_number(&u.phone_number) == digits)
            .cloned())
    }

    async fn find_by_stable_id(&self, stable_id: &str) -> DirectoryResult<Option<UserRecord>> {
        let cache = self.cache.read().await;
        Ok(cache.values().find(|u| u.stable_id == stable_id).cloned())
    }

    async fn update_profile(
        &self,
        stable_id: &str,
        update: ProfileUpdate,
    ) -> DirectoryResult<UserRecord> {
        if update.is_empty() {
            return Err(DirectoryError::InvalidInput(
                "No fields provided for update".to_string(),
            ));
        }

        let mut cache = self.cache.write().await;
        let mut record = cache
            .values()
            .find(|u| u.stable_id == stable_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(stable_id.to_string()))?;
        record.apply_profile(update);

        self.commit(&mut cache, record).await
    }
}
