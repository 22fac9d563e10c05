//! Collaborator seams consumed by the admission workflows.
//!
//! Each trait mirrors one group of REST contracts. [`super::client::PortalClient`] implements
//! them over HTTP; tests substitute in-memory doubles.

use async_trait::async_trait;

use super::attachments::UploadFile;
use super::domain::{
    Account, Application, ApplicationId, ApplicationPayload, AttachmentRef, Draft, DraftId,
    DraftSummary, NewAccount, OfficeUsePatch, OwnerId, SaveDraftRequest, SavedDraft,
};

/// Remote draft persistence.
#[async_trait]
pub trait DraftService: Send + Sync {
    async fn save(&self, request: SaveDraftRequest) -> Result<SavedDraft, RemoteError>;
    async fn list(&self, owner: &OwnerId) -> Result<Vec<DraftSummary>, RemoteError>;
    async fn fetch(&self, draft_id: &DraftId) -> Result<Draft, RemoteError>;
    async fn delete(&self, draft_id: &DraftId) -> Result<(), RemoteError>;
}

/// Remote file storage; only the upload contract is consumed.
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<AttachmentRef, RemoteError>;
}

/// Application records, including the office-use patch endpoint.
#[async_trait]
pub trait ApplicationGateway: Send + Sync {
    async fn create(&self, payload: &ApplicationPayload) -> Result<Application, RemoteError>;
    async fn fetch(&self, application_id: &ApplicationId) -> Result<Application, RemoteError>;
    async fn list(&self) -> Result<Vec<Application>, RemoteError>;
    async fn update_office_use(
        &self,
        application_id: &ApplicationId,
        patch: &OfficeUsePatch,
    ) -> Result<Application, RemoteError>;
}

/// Admin user-registration endpoint.
#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, RemoteError>;
}

/// Failure talking to a collaborator. Timeouts surface as `Transport`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("resource not found")]
    NotFound,
    #[error("collaborator responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound)
    }
}
