use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::workflows::admission::attachments::UploadFile;
use crate::workflows::admission::domain::{
    Account, AddressDetails, Application, ApplicationId, ApplicationPayload, ApplicationStatus,
    AttachmentRef, ContactDetails, Draft, DraftId, DraftSummary, NewAccount, OfficeUseOnly,
    OfficeUsePatch, OwnerId, PayloadPatch, SaveDraftRequest, SavedDraft, StudentDetails,
};
use crate::workflows::admission::drafts::DraftStore;
use crate::workflows::admission::fallback::MemoryFallbackCache;
use crate::workflows::admission::repository::{
    AccountProvisioner, ApplicationGateway, DraftService, FileUploader, RemoteError,
};

pub(super) fn owner() -> OwnerId {
    OwnerId("applicant-042".to_string())
}

pub(super) fn server_error() -> RemoteError {
    RemoteError::Status {
        status: 500,
        body: "internal server error".to_string(),
    }
}

pub(super) fn student_details() -> StudentDetails {
    StudentDetails {
        student_name: "Asha Reddy".to_string(),
        father_name: "Ravi Reddy".to_string(),
        mother_name: "Lakshmi Reddy".to_string(),
        date_of_birth: "2008-04-17".to_string(),
        gender: "Female".to_string(),
        nationality: "Indian".to_string(),
        ..StudentDetails::default()
    }
}

pub(super) fn address_details() -> AddressDetails {
    AddressDetails {
        house_no: "4-12/7".to_string(),
        street: "Temple Street".to_string(),
        village: "Allagadda".to_string(),
        mandal: "Allagadda".to_string(),
        district: "Nandyal".to_string(),
        pin_code: "518543".to_string(),
        state: "Andhra Pradesh".to_string(),
        ..AddressDetails::default()
    }
}

pub(super) fn contact_details() -> ContactDetails {
    ContactDetails {
        mobile_no: "9876543210".to_string(),
        email: "asha.reddy@example.com".to_string(),
        ..ContactDetails::default()
    }
}

pub(super) fn phase_one_patch() -> PayloadPatch {
    PayloadPatch {
        student_details: Some(student_details()),
        address_details: Some(address_details()),
        contact_details: Some(contact_details()),
        ..PayloadPatch::default()
    }
}

pub(super) fn attachment(name: &str) -> AttachmentRef {
    AttachmentRef::new(format!("https://files.test/{name}"), name)
}

/// A payload that passes every gate.
pub(super) fn complete_payload() -> ApplicationPayload {
    let mut payload = ApplicationPayload::default();
    payload.merge(phase_one_patch());
    payload
        .other_details
        .insert("hostelRequired".to_string(), json!(true));
    payload.preferences.select_degree_group("BSc");
    payload.preferences.toggle_bsc_specialization("MPCs");
    payload.signature_upload.student_signature = Some(attachment("signature.png"));
    payload.signature_upload.passport_size_photo = Some(attachment("photo.jpg"));
    payload
}

pub(super) fn upload(name: &str) -> UploadFile {
    UploadFile::new(name, vec![0x25, 0x50, 0x44, 0x46])
}

#[derive(Default)]
pub(super) struct MemoryDraftService {
    drafts: Mutex<HashMap<DraftId, Draft>>,
    sequence: AtomicU64,
    fail_saves: AtomicBool,
    fail_deletes: AtomicBool,
    save_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryDraftService {
    pub(super) fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub(super) fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub(super) fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub(super) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub(super) fn stored(&self) -> Vec<Draft> {
        self.drafts
            .lock()
            .expect("draft mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub(super) fn insert(&self, draft: Draft) {
        self.drafts
            .lock()
            .expect("draft mutex poisoned")
            .insert(draft.draft_id.clone(), draft);
    }
}

#[async_trait]
impl DraftService for MemoryDraftService {
    async fn save(&self, request: SaveDraftRequest) -> Result<SavedDraft, RemoteError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        let draft_id = request.draft_id.unwrap_or_else(|| {
            let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            DraftId(format!("draft-{next:04}"))
        });
        let saved_at = Utc::now();
        self.insert(Draft {
            draft_id: draft_id.clone(),
            owner: request.owner,
            payload: request.payload,
            saved_at,
        });
        Ok(SavedDraft { draft_id, saved_at })
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<DraftSummary>, RemoteError> {
        Ok(self
            .stored()
            .iter()
            .filter(|draft| &draft.owner == owner)
            .map(Draft::summary)
            .collect())
    }

    async fn fetch(&self, draft_id: &DraftId) -> Result<Draft, RemoteError> {
        self.drafts
            .lock()
            .expect("draft mutex poisoned")
            .get(draft_id)
            .cloned()
            .ok_or(RemoteError::NotFound)
    }

    async fn delete(&self, draft_id: &DraftId) -> Result<(), RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        match self
            .drafts
            .lock()
            .expect("draft mutex poisoned")
            .remove(draft_id)
        {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound),
        }
    }
}

#[derive(Default)]
pub(super) struct MemoryUploader {
    uploads: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryUploader {
    pub(super) fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(super) fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileUploader for MemoryUploader {
    async fn upload(&self, file: UploadFile) -> Result<AttachmentRef, RemoteError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 413,
                body: "payload too large".to_string(),
            });
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let mut attachment =
            AttachmentRef::new(format!("https://files.test/{n}/{}", file.file_name), &file.file_name);
        attachment
            .metadata
            .insert("size".to_string(), json!(file.bytes.len()));
        attachment
            .metadata
            .insert("contentType".to_string(), json!(file.content_type));
        Ok(attachment)
    }
}

#[derive(Default)]
pub(super) struct MemoryApplications {
    records: Mutex<Vec<Application>>,
    create_failures_remaining: AtomicUsize,
    create_calls: AtomicUsize,
    fail_office_use: AtomicBool,
    office_use_writes: Mutex<Vec<OfficeUsePatch>>,
}

impl MemoryApplications {
    pub(super) fn fail_next_creates(&self, count: usize) {
        self.create_failures_remaining.store(count, Ordering::SeqCst);
    }

    pub(super) fn set_fail_office_use(&self, fail: bool) {
        self.fail_office_use.store(fail, Ordering::SeqCst);
    }

    pub(super) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(super) fn records(&self) -> Vec<Application> {
        self.records.lock().expect("application mutex poisoned").clone()
    }

    pub(super) fn office_use_writes(&self) -> Vec<OfficeUsePatch> {
        self.office_use_writes
            .lock()
            .expect("office-use mutex poisoned")
            .clone()
    }

    pub(super) fn seed(&self, payload: ApplicationPayload) -> Application {
        let mut records = self.records.lock().expect("application mutex poisoned");
        let application = Application {
            id: format!("db-{}", records.len() + 1),
            application_id: ApplicationId(format!("APP-2026-{:05}", records.len() + 1)),
            payload,
            status: ApplicationStatus::Submitted,
            office_use_only: OfficeUseOnly::default(),
            submitted_at: Utc::now(),
        };
        records.push(application.clone());
        application
    }
}

#[async_trait]
impl ApplicationGateway for MemoryApplications {
    async fn create(&self, payload: &ApplicationPayload) -> Result<Application, RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.create_failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.create_failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(RemoteError::Transport("gateway timeout".to_string()));
        }
        Ok(self.seed(payload.clone()))
    }

    async fn fetch(&self, application_id: &ApplicationId) -> Result<Application, RemoteError> {
        self.records()
            .into_iter()
            .find(|app| &app.application_id == application_id)
            .ok_or(RemoteError::NotFound)
    }

    async fn list(&self) -> Result<Vec<Application>, RemoteError> {
        Ok(self.records())
    }

    async fn update_office_use(
        &self,
        application_id: &ApplicationId,
        patch: &OfficeUsePatch,
    ) -> Result<Application, RemoteError> {
        if self.fail_office_use.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        self.office_use_writes
            .lock()
            .expect("office-use mutex poisoned")
            .push(patch.clone());
        let mut records = self.records.lock().expect("application mutex poisoned");
        let record = records
            .iter_mut()
            .find(|app| &app.application_id == application_id)
            .ok_or(RemoteError::NotFound)?;
        record.office_use_only.apply(patch);
        Ok(record.clone())
    }
}

#[derive(Default)]
pub(super) struct MemoryAccounts {
    accounts: Mutex<Vec<NewAccount>>,
    fail: AtomicBool,
}

impl MemoryAccounts {
    pub(super) fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(super) fn created(&self) -> Vec<NewAccount> {
        self.accounts.lock().expect("account mutex poisoned").clone()
    }
}

#[async_trait]
impl AccountProvisioner for MemoryAccounts {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, RemoteError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        self.accounts
            .lock()
            .expect("account mutex poisoned")
            .push(account.clone());
        Ok(Account {
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role.clone(),
            department: account.department.clone(),
            batch: account.batch.clone(),
            section: account.section.clone(),
            phone: account.phone.clone(),
            enrollment_id: account.enrollment_id.clone(),
        })
    }
}

pub(super) type TestDraftStore = DraftStore<MemoryDraftService, MemoryFallbackCache>;

pub(super) fn draft_store() -> (
    Arc<TestDraftStore>,
    Arc<MemoryDraftService>,
    Arc<MemoryFallbackCache>,
) {
    let service = Arc::new(MemoryDraftService::default());
    let cache = Arc::new(MemoryFallbackCache::default());
    let store = Arc::new(DraftStore::new(service.clone(), cache.clone(), owner()));
    (store, service, cache)
}
