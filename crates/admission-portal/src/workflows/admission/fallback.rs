//! Local recovery copy of the last payload a user tried to save.
//!
//! One slot per owner, last write wins. Two drafts edited offline in the same session
//! overwrite each other here; the cache is read only as a recovery source and is never
//! synced back to the server.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationPayload, DraftId, OwnerId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackEntry {
    pub owner: OwnerId,
    #[serde(default)]
    pub draft_id: Option<DraftId>,
    pub payload: ApplicationPayload,
    pub stored_at: DateTime<Utc>,
}

#[async_trait]
pub trait FallbackCache: Send + Sync {
    async fn store(&self, entry: FallbackEntry) -> Result<(), FallbackError>;
    async fn load(&self, owner: &OwnerId) -> Result<Option<FallbackEntry>, FallbackError>;
    async fn clear(&self, owner: &OwnerId) -> Result<(), FallbackError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("fallback cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fallback cache entry is not valid json: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("fallback cache lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
pub struct MemoryFallbackCache {
    slots: Mutex<HashMap<OwnerId, FallbackEntry>>,
}

#[async_trait]
impl FallbackCache for MemoryFallbackCache {
    async fn store(&self, entry: FallbackEntry) -> Result<(), FallbackError> {
        let mut slots = self.slots.lock().map_err(|_| FallbackError::Poisoned)?;
        slots.insert(entry.owner.clone(), entry);
        Ok(())
    }

    async fn load(&self, owner: &OwnerId) -> Result<Option<FallbackEntry>, FallbackError> {
        let slots = self.slots.lock().map_err(|_| FallbackError::Poisoned)?;
        Ok(slots.get(owner).cloned())
    }

    async fn clear(&self, owner: &OwnerId) -> Result<(), FallbackError> {
        let mut slots = self.slots.lock().map_err(|_| FallbackError::Poisoned)?;
        slots.remove(owner);
        Ok(())
    }
}

/// JSON file per owner under a cache directory.
#[derive(Debug, Clone)]
pub struct FileFallbackCache {
    directory: PathBuf,
}

impl FileFallbackCache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Hex of the owner's bytes, so distinct owners never share a file.
    fn slot_path(&self, owner: &OwnerId) -> PathBuf {
        let file_stem: String = owner
            .0
            .bytes()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        self.directory.join(format!("{file_stem}.json"))
    }
}

#[async_trait]
impl FallbackCache for FileFallbackCache {
    async fn store(&self, entry: FallbackEntry) -> Result<(), FallbackError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let encoded = serde_json::to_vec_pretty(&entry)?;
        tokio::fs::write(self.slot_path(&entry.owner), encoded).await?;
        Ok(())
    }

    async fn load(&self, owner: &OwnerId) -> Result<Option<FallbackEntry>, FallbackError> {
        match tokio::fs::read(self.slot_path(owner)).await {
            Ok(bytes) => {
                let entry: FallbackEntry = serde_json::from_slice(&bytes)?;
                Ok(Some(entry).filter(|entry| &entry.owner == owner))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn clear(&self, owner: &OwnerId) -> Result<(), FallbackError> {
        match tokio::fs::remove_file(self.slot_path(owner)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
