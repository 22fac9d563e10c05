//! Three-phase applicant wizard.
//!
//! [`reduce`] is a pure transition function over [`WizardState`]; it validates, applies
//! edits, and tells the caller which side effect to run. [`WizardController`] owns the state,
//! runs the autosave before committing a phase move, and hands the finished payload to the
//! submission coordinator.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::attachments::{AttachmentTracker, SignatureKind, UploadError, UploadFile};
use super::domain::{Application, ApplicationPayload, AttachmentRef, DocumentKey, PayloadPatch};
use super::drafts::{DraftHandle, DraftStore, SaveOutcome};
use super::fallback::FallbackCache;
use super::repository::{ApplicationGateway, DraftService, FileUploader};
use super::submission::{SubmissionCoordinator, SubmissionError};
use super::validation::{
    validate_personal_address_contact, validate_signature_upload, ValidationErrors,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    PersonalAddressContact,
    OtherDetailsUploadsStudyPreferences,
    SignatureReview,
}

impl WizardPhase {
    pub const fn number(self) -> u8 {
        match self {
            WizardPhase::PersonalAddressContact => 1,
            WizardPhase::OtherDetailsUploadsStudyPreferences => 2,
            WizardPhase::SignatureReview => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            WizardPhase::PersonalAddressContact => "Personal, address and contact details",
            WizardPhase::OtherDetailsUploadsStudyPreferences => {
                "Other details, documents, study history and preferences"
            }
            WizardPhase::SignatureReview => "Signature and review",
        }
    }

    const fn next(self) -> Option<Self> {
        match self {
            WizardPhase::PersonalAddressContact => {
                Some(WizardPhase::OtherDetailsUploadsStudyPreferences)
            }
            WizardPhase::OtherDetailsUploadsStudyPreferences => Some(WizardPhase::SignatureReview),
            WizardPhase::SignatureReview => None,
        }
    }

    const fn previous(self) -> Option<Self> {
        match self {
            WizardPhase::PersonalAddressContact => None,
            WizardPhase::OtherDetailsUploadsStudyPreferences => {
                Some(WizardPhase::PersonalAddressContact)
            }
            WizardPhase::SignatureReview => Some(WizardPhase::OtherDetailsUploadsStudyPreferences),
        }
    }
}

impl fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    InProgress(WizardPhase),
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    pub step: WizardStep,
    pub handle: DraftHandle,
    pub errors: ValidationErrors,
}

impl WizardState {
    pub fn new(handle: DraftHandle) -> Self {
        Self {
            step: WizardStep::InProgress(WizardPhase::PersonalAddressContact),
            handle,
            errors: ValidationErrors::default(),
        }
    }

    pub fn phase(&self) -> Option<WizardPhase> {
        match self.step {
            WizardStep::InProgress(phase) => Some(phase),
            WizardStep::Completed => None,
        }
    }

    pub fn payload(&self) -> &ApplicationPayload {
        &self.handle.payload
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    Edit(PayloadPatch),
    SelectDegreeGroup(String),
    ToggleBscSpecialization(String),
    Next,
    Previous,
    Submit,
}

impl WizardEvent {
    fn name(&self) -> &'static str {
        match self {
            WizardEvent::Edit(_) => "edit",
            WizardEvent::SelectDegreeGroup(_) => "select_degree_group",
            WizardEvent::ToggleBscSpecialization(_) => "toggle_bsc_specialization",
            WizardEvent::Next => "next",
            WizardEvent::Previous => "previous",
            WizardEvent::Submit => "submit",
        }
    }
}

/// Side effect the caller must run after a successful reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    AutosaveThenMove(WizardPhase),
    Submit,
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("'{event}' is not available in phase {phase}")]
    Unavailable {
        event: &'static str,
        phase: WizardPhase,
    },
    #[error("the application has already been submitted")]
    Completed,
}

/// Apply one event. Edits mutate the payload in place; phase moves are only requested.
pub fn reduce(state: &mut WizardState, event: WizardEvent) -> Result<Effect, WizardError> {
    let phase = match state.step {
        WizardStep::InProgress(phase) => phase,
        WizardStep::Completed => return Err(WizardError::Completed),
    };

    match event {
        WizardEvent::Edit(patch) => {
            state.handle.payload.merge(patch);
            Ok(Effect::None)
        }
        WizardEvent::SelectDegreeGroup(group) => {
            state.handle.payload.preferences.select_degree_group(group);
            Ok(Effect::None)
        }
        WizardEvent::ToggleBscSpecialization(name) => {
            state
                .handle
                .payload
                .preferences
                .toggle_bsc_specialization(&name);
            Ok(Effect::None)
        }
        WizardEvent::Next => {
            let Some(target) = phase.next() else {
                return Err(WizardError::Unavailable {
                    event: WizardEvent::Next.name(),
                    phase,
                });
            };
            if phase == WizardPhase::PersonalAddressContact {
                gate(state, validate_personal_address_contact)?;
            }
            state.errors = ValidationErrors::default();
            Ok(Effect::AutosaveThenMove(target))
        }
        WizardEvent::Previous => match phase.previous() {
            Some(target) => {
                state.errors = ValidationErrors::default();
                Ok(Effect::AutosaveThenMove(target))
            }
            None => Ok(Effect::None),
        },
        WizardEvent::Submit => {
            if phase != WizardPhase::SignatureReview {
                return Err(WizardError::Unavailable {
                    event: WizardEvent::Submit.name(),
                    phase,
                });
            }
            gate(state, validate_signature_upload)?;
            state.errors = ValidationErrors::default();
            Ok(Effect::Submit)
        }
    }
}

fn gate(
    state: &mut WizardState,
    rule: fn(&ApplicationPayload) -> Result<(), ValidationErrors>,
) -> Result<(), WizardError> {
    rule(&state.handle.payload).map_err(|errors| {
        state.errors = errors.clone();
        WizardError::Validation(errors)
    })
}

/// What a phase move produced: where the wizard is now and how the autosave went.
#[derive(Debug)]
pub struct StepReport {
    pub phase: WizardPhase,
    pub save: Option<SaveOutcome>,
}

#[derive(Debug, thiserror::Error)]
pub enum WizardSubmitError {
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Drives one applicant through the wizard, autosaving on every phase move.
pub struct WizardController<S, C> {
    drafts: Arc<DraftStore<S, C>>,
    state: WizardState,
}

impl<S, C> WizardController<S, C>
where
    S: DraftService + 'static,
    C: FallbackCache + 'static,
{
    pub fn start(drafts: Arc<DraftStore<S, C>>) -> Self {
        Self::resume(drafts, DraftHandle::default())
    }

    /// Continue from a resumed draft. Saves update that draft instead of creating a new one.
    pub fn resume(drafts: Arc<DraftStore<S, C>>, handle: DraftHandle) -> Self {
        Self {
            drafts,
            state: WizardState::new(handle),
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn handle(&self) -> &DraftHandle {
        &self.state.handle
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.state.errors
    }

    pub fn edit(&mut self, patch: PayloadPatch) -> Result<(), WizardError> {
        reduce(&mut self.state, WizardEvent::Edit(patch)).map(|_| ())
    }

    pub fn select_degree_group(&mut self, group: impl Into<String>) -> Result<(), WizardError> {
        reduce(&mut self.state, WizardEvent::SelectDegreeGroup(group.into())).map(|_| ())
    }

    pub fn toggle_bsc_specialization(&mut self, name: impl Into<String>) -> Result<(), WizardError> {
        reduce(&mut self.state, WizardEvent::ToggleBscSpecialization(name.into())).map(|_| ())
    }

    pub async fn next(&mut self) -> Result<StepReport, WizardError> {
        self.advance(WizardEvent::Next).await
    }

    pub async fn previous(&mut self) -> Result<StepReport, WizardError> {
        self.advance(WizardEvent::Previous).await
    }

    async fn advance(&mut self, event: WizardEvent) -> Result<StepReport, WizardError> {
        let current = self.state.phase().ok_or(WizardError::Completed)?;
        match reduce(&mut self.state, event)? {
            Effect::AutosaveThenMove(target) => {
                let outcome = self.drafts.autosave(&mut self.state.handle).await;
                self.state.step = WizardStep::InProgress(target);
                debug!(
                    from = current.number(),
                    to = target.number(),
                    degraded = outcome.is_degraded(),
                    "wizard phase changed"
                );
                Ok(StepReport {
                    phase: target,
                    save: Some(outcome),
                })
            }
            Effect::None | Effect::Submit => Ok(StepReport {
                phase: current,
                save: None,
            }),
        }
    }

    /// Upload a supporting document into the uploads section.
    pub async fn upload_document<U>(
        &mut self,
        tracker: &AttachmentTracker<U>,
        key: DocumentKey,
        file: UploadFile,
    ) -> Result<Option<AttachmentRef>, UploadError>
    where
        U: FileUploader + 'static,
    {
        let mut files = self.state.handle.payload.uploaded_files.clone();
        let replaced = tracker.attach(key, file, &mut files).await?;
        self.apply_upload(PayloadPatch {
            uploaded_files: Some(files),
            ..PayloadPatch::default()
        });
        Ok(replaced)
    }

    pub async fn upload_signature<U>(
        &mut self,
        tracker: &AttachmentTracker<U>,
        kind: SignatureKind,
        file: UploadFile,
    ) -> Result<Option<AttachmentRef>, UploadError>
    where
        U: FileUploader + 'static,
    {
        let mut signatures = self.state.handle.payload.signature_upload.clone();
        let replaced = tracker.attach_signature(kind, file, &mut signatures).await?;
        self.apply_upload(PayloadPatch {
            signature_upload: Some(signatures),
            ..PayloadPatch::default()
        });
        Ok(replaced)
    }

    fn apply_upload(&mut self, patch: PayloadPatch) {
        if let Err(err) = self.edit(patch) {
            debug!(error = %err, "upload finished after the wizard closed");
        }
    }

    /// Validate signatures and submit. On failure the wizard stays in the review phase.
    pub async fn submit<A>(
        &mut self,
        coordinator: &SubmissionCoordinator<A, S, C>,
    ) -> Result<Application, WizardSubmitError>
    where
        A: ApplicationGateway + 'static,
    {
        reduce(&mut self.state, WizardEvent::Submit)?;
        let application = coordinator.finalize(&self.state.handle).await?;
        self.state.step = WizardStep::Completed;
        info!(application_id = %application.application_id, "wizard completed");
        Ok(application)
    }
}
