use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use admission_portal::workflows::admission::{
    Account, Application, ApplicationId, ApplicationPayload, ApplicationStatus, AttachmentRef,
    Draft, DraftId, DraftSummary, NewAccount, OfficeUseOnly, OfficeUsePatch, OwnerId, SavedDraft,
};
use chrono::{Datelike, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("not found")]
    NotFound,
    #[error("{0} belongs to another user")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Unavailable(String),
}

/// Uploaded file kept by the reference backend.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

/// In-memory implementation of every REST collaborator the portal talks to.
///
/// Failure switches let demos and tests simulate outages of individual endpoints.
#[derive(Default)]
pub struct PortalBackend {
    drafts: Mutex<HashMap<DraftId, Draft>>,
    applications: Mutex<Vec<Application>>,
    accounts: Mutex<Vec<Account>>,
    files: Mutex<HashMap<String, StoredFile>>,
    draft_sequence: AtomicU64,
    application_sequence: AtomicU64,
    file_sequence: AtomicU64,
    drafts_offline: AtomicBool,
    accounts_offline: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PortalBackend {
    pub fn set_drafts_offline(&self, offline: bool) {
        self.drafts_offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_accounts_offline(&self, offline: bool) {
        self.accounts_offline.store(offline, Ordering::SeqCst);
    }

    pub fn save_draft(
        &self,
        owner: &OwnerId,
        draft_id: Option<DraftId>,
        payload: ApplicationPayload,
    ) -> Result<SavedDraft, BackendError> {
        if self.drafts_offline.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable(
                "draft storage is temporarily unavailable".to_string(),
            ));
        }

        let mut drafts = lock(&self.drafts);
        let draft_id = match draft_id {
            Some(id) => {
                if let Some(existing) = drafts.get(&id) {
                    if &existing.owner != owner {
                        return Err(BackendError::Forbidden(format!("draft {id}")));
                    }
                }
                id
            }
            None => {
                let next = self.draft_sequence.fetch_add(1, Ordering::SeqCst) + 1;
                DraftId(format!("draft-{next:06}"))
            }
        };

        let saved_at = Utc::now();
        drafts.insert(
            draft_id.clone(),
            Draft {
                draft_id: draft_id.clone(),
                owner: owner.clone(),
                payload,
                saved_at,
            },
        );
        Ok(SavedDraft { draft_id, saved_at })
    }

    pub fn drafts_for(&self, owner: &OwnerId) -> Vec<DraftSummary> {
        let mut summaries: Vec<DraftSummary> = lock(&self.drafts)
            .values()
            .filter(|draft| &draft.owner == owner)
            .map(Draft::summary)
            .collect();
        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        summaries
    }

    /// Drafts are only visible to their owner; anyone else gets a 404.
    pub fn draft(&self, owner: &OwnerId, draft_id: &DraftId) -> Result<Draft, BackendError> {
        lock(&self.drafts)
            .get(draft_id)
            .filter(|draft| &draft.owner == owner)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    pub fn delete_draft(&self, owner: &OwnerId, draft_id: &DraftId) -> Result<(), BackendError> {
        let mut drafts = lock(&self.drafts);
        match drafts.get(draft_id) {
            Some(draft) if &draft.owner == owner => {
                drafts.remove(draft_id);
                Ok(())
            }
            _ => Err(BackendError::NotFound),
        }
    }

    /// Create an application, or return the existing one for the same applicant.
    ///
    /// The boolean is `true` when a new record was created.
    pub fn create_application(
        &self,
        payload: ApplicationPayload,
    ) -> Result<(Application, bool), BackendError> {
        let key = applicant_key(&payload);
        let mut applications = lock(&self.applications);
        if let Some(existing) = applications
            .iter()
            .find(|app| applicant_key(&app.payload) == key)
        {
            info!(application_id = %existing.application_id, "duplicate submission collapsed");
            return Ok((existing.clone(), false));
        }

        let next = self.application_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let application = Application {
            id: format!("{next:024x}"),
            application_id: ApplicationId(format!("APP-{}-{next:06}", Utc::now().year())),
            payload,
            status: ApplicationStatus::Submitted,
            office_use_only: OfficeUseOnly::default(),
            submitted_at: Utc::now(),
        };
        applications.push(application.clone());
        info!(application_id = %application.application_id, "application created");
        Ok((application, true))
    }

    pub fn applications(&self) -> Vec<Application> {
        lock(&self.applications).clone()
    }

    pub fn application(&self, application_id: &ApplicationId) -> Result<Application, BackendError> {
        lock(&self.applications)
            .iter()
            .find(|app| &app.application_id == application_id)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    /// Merge an office-use patch. Writing a student id approves the application.
    pub fn update_office_use(
        &self,
        application_id: &ApplicationId,
        patch: &OfficeUsePatch,
    ) -> Result<Application, BackendError> {
        let mut applications = lock(&self.applications);
        let record = applications
            .iter_mut()
            .find(|app| &app.application_id == application_id)
            .ok_or(BackendError::NotFound)?;
        record.office_use_only.apply(patch);
        if patch
            .student_id_generated
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
        {
            record.status = ApplicationStatus::Approved;
        }
        Ok(record.clone())
    }

    pub fn register_user(&self, account: NewAccount) -> Result<Account, BackendError> {
        if self.accounts_offline.load(Ordering::SeqCst) {
            warn!(email = %account.email, "rejecting registration: account service offline");
            return Err(BackendError::Unavailable(
                "account service is temporarily unavailable".to_string(),
            ));
        }
        if account.email.trim().is_empty() || account.password.is_empty() {
            return Err(BackendError::Invalid(
                "email and password are required".to_string(),
            ));
        }

        let mut accounts = lock(&self.accounts);
        if accounts
            .iter()
            .any(|existing| existing.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(BackendError::Conflict(format!(
                "an account for {} already exists",
                account.email
            )));
        }

        let NewAccount {
            name,
            email,
            role,
            department,
            batch,
            section,
            phone,
            enrollment_id,
            ..
        } = account;
        let created = Account {
            name,
            email,
            role,
            department,
            batch,
            section,
            phone,
            enrollment_id,
        };
        accounts.push(created.clone());
        Ok(created)
    }

    pub fn accounts(&self) -> Vec<Account> {
        lock(&self.accounts).clone()
    }

    pub fn store_file(
        &self,
        file_name: String,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> Result<AttachmentRef, BackendError> {
        if bytes.is_empty() {
            return Err(BackendError::Invalid(format!("'{file_name}' is empty")));
        }
        let content_type = content_type.unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        let next = self.file_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let key = format!("{next:06}");
        let mut attachment =
            AttachmentRef::new(format!("/files/{key}/{file_name}"), file_name.clone());
        attachment
            .metadata
            .insert("size".to_string(), json!(bytes.len()));
        attachment
            .metadata
            .insert("contentType".to_string(), json!(content_type));

        lock(&self.files).insert(
            key,
            StoredFile {
                file_name,
                content_type,
                size: bytes.len(),
            },
        );
        Ok(attachment)
    }

    pub fn files(&self) -> Vec<StoredFile> {
        lock(&self.files).values().cloned().collect()
    }
}

/// Identity used to collapse repeated submissions from the same applicant.
fn applicant_key(payload: &ApplicationPayload) -> (String, String, String, String) {
    let normalize = |value: &str| value.trim().to_ascii_lowercase();
    (
        normalize(&payload.student_details.student_name),
        normalize(&payload.student_details.date_of_birth),
        normalize(&payload.contact_details.mobile_no),
        normalize(&payload.contact_details.email),
    )
}
