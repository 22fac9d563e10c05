use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{Application, DraftId};
use super::drafts::{DraftHandle, DraftStore};
use super::fallback::FallbackCache;
use super::repository::{ApplicationGateway, DraftService, RemoteError};

/// Application creation failed. The draft is untouched and the payload was stashed locally.
#[derive(Debug, thiserror::Error)]
#[error("application could not be submitted: {source}")]
pub struct SubmissionError {
    pub source: RemoteError,
    pub draft_id: Option<DraftId>,
    pub preserved_locally: bool,
}

/// Turns a completed wizard payload into an application and retires the draft behind it.
///
/// Duplicate applications across retries are the creation endpoint's concern; the only
/// bookkeeping here is the draft id.
pub struct SubmissionCoordinator<A, S, C> {
    applications: Arc<A>,
    drafts: Arc<DraftStore<S, C>>,
}

impl<A, S, C> SubmissionCoordinator<A, S, C>
where
    A: ApplicationGateway + 'static,
    S: DraftService + 'static,
    C: FallbackCache + 'static,
{
    pub fn new(applications: Arc<A>, drafts: Arc<DraftStore<S, C>>) -> Self {
        Self {
            applications,
            drafts,
        }
    }

    pub async fn finalize(&self, handle: &DraftHandle) -> Result<Application, SubmissionError> {
        let application = match self.applications.create(&handle.payload).await {
            Ok(application) => application,
            Err(source) => {
                let preserved_locally = self.drafts.preserve_locally(handle).await;
                warn!(
                    draft_id = handle.id.as_ref().map(|id| id.0.as_str()).unwrap_or("<unsaved>"),
                    preserved_locally,
                    error = %source,
                    "application submission failed; draft kept for retry"
                );
                return Err(SubmissionError {
                    source,
                    draft_id: handle.id.clone(),
                    preserved_locally,
                });
            }
        };

        info!(
            application_id = %application.application_id,
            draft_id = handle.id.as_ref().map(|id| id.0.as_str()).unwrap_or("<unsaved>"),
            "application submitted"
        );

        if let Some(draft_id) = &handle.id {
            // A stray draft only resubmits if resumed, which the creation endpoint tolerates.
            if let Err(err) = self.drafts.delete_draft(draft_id).await {
                warn!(%draft_id, error = %err, "submitted draft could not be deleted");
            }
        }

        Ok(application)
    }
}
