//! Draft-based admission submission and office-side finalization.
//!
//! Applicants move through a three-phase wizard that autosaves a draft on every phase
//! change, then submit; the office later places the admitted student and provisions a
//! login. Remote collaborators sit behind the traits in [`repository`].

pub mod attachments;
pub mod client;
pub mod domain;
pub mod drafts;
pub mod fallback;
pub mod finalizer;
pub mod repository;
pub mod submission;
pub(crate) mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use attachments::{AttachmentTracker, SignatureKind, UploadError, UploadFile};
pub use client::PortalClient;
pub use domain::{
    Account, AddressDetails, Application, ApplicationId, ApplicationPayload, ApplicationStatus,
    AttachmentRef, CollegePreferences, ContactDetails, DocumentKey, Draft, DraftId, DraftSummary,
    NewAccount, OfficeUseOnly, OfficeUsePatch, OwnerId, PayloadPatch, Preferences,
    SaveDraftRequest, SavedDraft, SignatureUpload, StudentDetails, StudyDetails, StudyRecord,
    UploadedFiles, BSC_DEGREE_GROUP, STUDENT_ROLE, STUDY_CLASS_LABELS,
};
pub use drafts::{DraftHandle, DraftSaveDegraded, DraftStore, DraftStoreError, SaveOutcome};
pub use fallback::{
    FallbackCache, FallbackEntry, FallbackError, FileFallbackCache, MemoryFallbackCache,
};
pub use finalizer::{
    generate_admission_number, AccountFlagOrder, AdmissionCase, AdmissionFinalizer,
    AdmissionState, FinalizationError, OfficePlacement,
};
pub use repository::{
    AccountProvisioner, ApplicationGateway, DraftService, FileUploader, RemoteError,
};
pub use submission::{SubmissionCoordinator, SubmissionError};
pub use validation::ValidationErrors;
pub use wizard::{
    reduce, Effect, StepReport, WizardController, WizardError, WizardEvent, WizardPhase,
    WizardState, WizardStep, WizardSubmitError,
};
