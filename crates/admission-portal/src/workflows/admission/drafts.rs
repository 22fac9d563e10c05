use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::domain::{ApplicationPayload, Draft, DraftId, DraftSummary, OwnerId, SaveDraftRequest};
use super::fallback::{FallbackCache, FallbackEntry, FallbackError};
use super::repository::{DraftService, RemoteError};

/// In-progress payload together with the draft it belongs to, if it was ever saved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftHandle {
    pub id: Option<DraftId>,
    pub payload: ApplicationPayload,
}

impl DraftHandle {
    pub fn new(payload: ApplicationPayload) -> Self {
        Self { id: None, payload }
    }

    pub fn resumed(draft: Draft) -> Self {
        Self {
            id: Some(draft.draft_id),
            payload: draft.payload,
        }
    }
}

/// Result of an autosave. Degradation is reported, never raised.
#[derive(Debug)]
pub enum SaveOutcome {
    Saved(DraftId),
    Degraded(DraftSaveDegraded),
}

impl SaveOutcome {
    pub fn draft_id(&self) -> Option<&DraftId> {
        match self {
            SaveOutcome::Saved(id) => Some(id),
            SaveOutcome::Degraded(degraded) => degraded.draft_id.as_ref(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, SaveOutcome::Degraded(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            SaveOutcome::Saved(_) => "Draft saved",
            SaveOutcome::Degraded(degraded) if degraded.cached_locally => {
                "Saved locally, will sync when the portal is reachable"
            }
            SaveOutcome::Degraded(_) => "Draft could not be saved; keep this page open",
        }
    }
}

/// The remote save failed; the payload went to the local fallback slot instead.
#[derive(Debug, thiserror::Error)]
#[error("draft saved locally only ({reason})")]
pub struct DraftSaveDegraded {
    pub draft_id: Option<DraftId>,
    pub reason: RemoteError,
    pub cached_locally: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DraftStoreError {
    #[error("draft {0} not found")]
    NotFound(DraftId),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Fallback(#[from] FallbackError),
}

/// Draft persistence for one signed-in owner, with a local fallback slot.
pub struct DraftStore<S, C> {
    service: Arc<S>,
    cache: Arc<C>,
    owner: OwnerId,
}

impl<S, C> DraftStore<S, C>
where
    S: DraftService + 'static,
    C: FallbackCache + 'static,
{
    pub fn new(service: Arc<S>, cache: Arc<C>, owner: OwnerId) -> Self {
        Self {
            service,
            cache,
            owner,
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Create a draft, or overwrite `draft_id` when given.
    pub async fn save_draft(
        &self,
        payload: &ApplicationPayload,
        draft_id: Option<&DraftId>,
    ) -> SaveOutcome {
        let request = SaveDraftRequest {
            draft_id: draft_id.cloned(),
            owner: self.owner.clone(),
            payload: payload.clone(),
        };

        match self.service.save(request).await {
            Ok(saved) => {
                debug!(draft_id = %saved.draft_id, owner = %self.owner, "draft saved");
                SaveOutcome::Saved(saved.draft_id)
            }
            Err(reason) => {
                let cached_locally = self.write_fallback(payload, draft_id).await;
                warn!(
                    owner = %self.owner,
                    draft_id = draft_id.map(|id| id.0.as_str()).unwrap_or("<new>"),
                    degraded = true,
                    cached_locally,
                    error = %reason,
                    "draft save degraded to local fallback"
                );
                SaveOutcome::Degraded(DraftSaveDegraded {
                    draft_id: draft_id.cloned(),
                    reason,
                    cached_locally,
                })
            }
        }
    }

    /// Save the handle's payload and record any newly assigned id on it.
    pub async fn autosave(&self, handle: &mut DraftHandle) -> SaveOutcome {
        let outcome = self.save_draft(&handle.payload, handle.id.as_ref()).await;
        if let SaveOutcome::Saved(id) = &outcome {
            handle.id = Some(id.clone());
        }
        outcome
    }

    /// Server-authoritative listing, newest first. The local fallback is not merged in.
    pub async fn list_drafts(&self) -> Result<Vec<DraftSummary>, DraftStoreError> {
        let mut drafts = self.service.list(&self.owner).await?;
        drafts.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(drafts)
    }

    pub async fn get_draft(&self, draft_id: &DraftId) -> Result<Draft, DraftStoreError> {
        self.service.fetch(draft_id).await.map_err(|err| match err {
            RemoteError::NotFound => DraftStoreError::NotFound(draft_id.clone()),
            other => DraftStoreError::Remote(other),
        })
    }

    /// Load a draft into a handle tagged with its id so later saves update it in place.
    pub async fn resume(&self, draft_id: &DraftId) -> Result<DraftHandle, DraftStoreError> {
        let draft = self.get_draft(draft_id).await?;
        info!(draft_id = %draft.draft_id, owner = %self.owner, "draft resumed");
        Ok(DraftHandle::resumed(draft))
    }

    /// Retire a draft. An already-deleted draft counts as success.
    pub async fn delete_draft(&self, draft_id: &DraftId) -> Result<(), DraftStoreError> {
        match self.service.delete(draft_id).await {
            Ok(()) | Err(RemoteError::NotFound) => {
                debug!(%draft_id, "draft retired");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Keep a copy of the handle in the fallback slot. Returns whether the write landed.
    pub async fn preserve_locally(&self, handle: &DraftHandle) -> bool {
        self.write_fallback(&handle.payload, handle.id.as_ref())
            .await
    }

    /// Read the recovery copy for this owner, if any.
    pub async fn recover(&self) -> Result<Option<FallbackEntry>, DraftStoreError> {
        Ok(self.cache.load(&self.owner).await?)
    }

    pub async fn clear_fallback(&self) -> Result<(), DraftStoreError> {
        Ok(self.cache.clear(&self.owner).await?)
    }

    async fn write_fallback(&self, payload: &ApplicationPayload, draft_id: Option<&DraftId>) -> bool {
        let entry = FallbackEntry {
            owner: self.owner.clone(),
            draft_id: draft_id.cloned(),
            payload: payload.clone(),
            stored_at: Utc::now(),
        };
        match self.cache.store(entry).await {
            Ok(()) => true,
            Err(err) => {
                warn!(owner = %self.owner, error = %err, "local fallback write failed");
                false
            }
        }
    }
}
