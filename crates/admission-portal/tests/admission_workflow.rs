use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use admission_portal::workflows::admission::{
    Account, AccountFlagOrder, AccountProvisioner, AddressDetails, AdmissionFinalizer,
    AdmissionState, Application, ApplicationGateway, ApplicationId, ApplicationPayload,
    ApplicationStatus, AttachmentRef, AttachmentTracker, ContactDetails, DocumentKey, Draft,
    DraftId, DraftService, DraftStore, DraftSummary, FileFallbackCache, FileUploader, NewAccount,
    OfficeUseOnly, OfficePlacement, OfficeUsePatch, OwnerId, PayloadPatch, RemoteError,
    SaveDraftRequest, SavedDraft, SignatureKind, StudentDetails, SubmissionCoordinator,
    UploadFile, WizardController, WizardPhase, WizardStep,
};
use async_trait::async_trait;
use chrono::Utc;

/// One in-process backend standing in for every remote collaborator.
#[derive(Default)]
struct Backend {
    drafts: Mutex<Vec<Draft>>,
    applications: Mutex<Vec<Application>>,
    accounts: Mutex<Vec<NewAccount>>,
    sequence: AtomicU64,
    drafts_offline: AtomicBool,
}

impl Backend {
    fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl DraftService for Backend {
    async fn save(&self, request: SaveDraftRequest) -> Result<SavedDraft, RemoteError> {
        if self.drafts_offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                body: "maintenance".to_string(),
            });
        }
        let draft_id = request
            .draft_id
            .unwrap_or_else(|| DraftId(format!("draft-{:06}", self.next_id())));
        let saved_at = Utc::now();
        let mut drafts = self.drafts.lock().expect("drafts lock");
        drafts.retain(|draft| draft.draft_id != draft_id);
        drafts.push(Draft {
            draft_id: draft_id.clone(),
            owner: request.owner,
            payload: request.payload,
            saved_at,
        });
        Ok(SavedDraft { draft_id, saved_at })
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<DraftSummary>, RemoteError> {
        let drafts = self.drafts.lock().expect("drafts lock");
        Ok(drafts
            .iter()
            .filter(|draft| &draft.owner == owner)
            .map(Draft::summary)
            .collect())
    }

    async fn fetch(&self, draft_id: &DraftId) -> Result<Draft, RemoteError> {
        let drafts = self.drafts.lock().expect("drafts lock");
        drafts
            .iter()
            .find(|draft| &draft.draft_id == draft_id)
            .cloned()
            .ok_or(RemoteError::NotFound)
    }

    async fn delete(&self, draft_id: &DraftId) -> Result<(), RemoteError> {
        let mut drafts = self.drafts.lock().expect("drafts lock");
        let before = drafts.len();
        drafts.retain(|draft| &draft.draft_id != draft_id);
        if drafts.len() == before {
            return Err(RemoteError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl FileUploader for Backend {
    async fn upload(&self, file: UploadFile) -> Result<AttachmentRef, RemoteError> {
        Ok(AttachmentRef::new(
            format!("https://cdn.portal.test/{}/{}", self.next_id(), file.file_name),
            file.file_name,
        ))
    }
}

#[async_trait]
impl ApplicationGateway for Backend {
    async fn create(&self, payload: &ApplicationPayload) -> Result<Application, RemoteError> {
        let mut applications = self.applications.lock().expect("applications lock");
        let seq = applications.len() + 1;
        let application = Application {
            id: format!("rec-{seq}"),
            application_id: ApplicationId(format!("APP-2026-{seq:06}")),
            payload: payload.clone(),
            status: ApplicationStatus::Submitted,
            office_use_only: OfficeUseOnly::default(),
            submitted_at: Utc::now(),
        };
        applications.push(application.clone());
        Ok(application)
    }

    async fn fetch(&self, application_id: &ApplicationId) -> Result<Application, RemoteError> {
        let applications = self.applications.lock().expect("applications lock");
        applications
            .iter()
            .find(|app| &app.application_id == application_id)
            .cloned()
            .ok_or(RemoteError::NotFound)
    }

    async fn list(&self) -> Result<Vec<Application>, RemoteError> {
        Ok(self.applications.lock().expect("applications lock").clone())
    }

    async fn update_office_use(
        &self,
        application_id: &ApplicationId,
        patch: &OfficeUsePatch,
    ) -> Result<Application, RemoteError> {
        let mut applications = self.applications.lock().expect("applications lock");
        let record = applications
            .iter_mut()
            .find(|app| &app.application_id == application_id)
            .ok_or(RemoteError::NotFound)?;
        record.office_use_only.apply(patch);
        Ok(record.clone())
    }
}

#[async_trait]
impl AccountProvisioner for Backend {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, RemoteError> {
        self.accounts
            .lock()
            .expect("accounts lock")
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

fn phase_one() -> PayloadPatch {
    PayloadPatch {
        student_details: Some(StudentDetails {
            student_name: "Kiran Kumar".to_string(),
            father_name: "Suresh Kumar".to_string(),
            mother_name: "Padma".to_string(),
            date_of_birth: "2007-11-02".to_string(),
            gender: "Male".to_string(),
            ..StudentDetails::default()
        }),
        address_details: Some(AddressDetails {
            house_no: "12-3".to_string(),
            street: "Main Road".to_string(),
            village: "Kadiri".to_string(),
            mandal: "Kadiri".to_string(),
            district: "Sri Sathya Sai".to_string(),
            pin_code: "515591".to_string(),
            ..AddressDetails::default()
        }),
        contact_details: Some(ContactDetails {
            mobile_no: "9000012345".to_string(),
            email: "kiran.kumar@example.com".to_string(),
            ..ContactDetails::default()
        }),
        ..PayloadPatch::default()
    }
}

fn file(name: &str) -> UploadFile {
    UploadFile::new(name, b"scanned document".to_vec())
}

#[tokio::test]
async fn applicant_to_student_account_end_to_end() {
    let cache_dir = tempfile::tempdir().expect("tempdir");
    let backend = Arc::new(Backend::default());
    let cache = Arc::new(FileFallbackCache::new(cache_dir.path()));
    let owner = OwnerId("user-kiran".to_string());
    let drafts = Arc::new(DraftStore::new(backend.clone(), cache, owner.clone()));
    let tracker = AttachmentTracker::new(backend.clone());

    // First sitting: phase one, then the portal goes down mid-session.
    let mut wizard = WizardController::start(drafts.clone());
    wizard.edit(phase_one()).expect("edit");
    let report = wizard.next().await.expect("to phase 2");
    let draft_id = report
        .save
        .as_ref()
        .and_then(|outcome| outcome.draft_id().cloned())
        .expect("draft created");

    backend.drafts_offline.store(true, Ordering::SeqCst);
    wizard
        .upload_document(&tracker, DocumentKey::SscMemo, file("ssc.pdf"))
        .await
        .expect("upload");
    let report = wizard.next().await.expect("moves despite outage");
    assert_eq!(report.phase, WizardPhase::SignatureReview);
    assert!(report.save.is_some_and(|outcome| outcome.is_degraded()));

    let recovered = drafts
        .recover()
        .await
        .expect("cache readable")
        .expect("recovery copy written");
    assert_eq!(recovered.draft_id.as_ref(), Some(&draft_id));
    assert!(recovered.payload.uploaded_files.get(DocumentKey::SscMemo).is_some());
    backend.drafts_offline.store(false, Ordering::SeqCst);

    // Second sitting: resume the server copy, which predates the upload.
    let listed = drafts.list_drafts().await.expect("lists");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].student_name, "Kiran Kumar");

    let handle = drafts.resume(&draft_id).await.expect("resumes");
    assert_eq!(handle.payload.uploaded_files.attached_count(), 0);
    let mut wizard = WizardController::resume(drafts.clone(), handle);
    wizard.next().await.expect("to phase 2");
    wizard
        .upload_document(&tracker, DocumentKey::SscMemo, file("ssc.pdf"))
        .await
        .expect("upload");
    wizard.select_degree_group("BSc").expect("select");
    wizard.toggle_bsc_specialization("MPCs").expect("toggle");
    wizard.next().await.expect("to phase 3");
    wizard
        .upload_signature(&tracker, SignatureKind::StudentSignature, file("sign.png"))
        .await
        .expect("signature");
    wizard
        .upload_signature(&tracker, SignatureKind::PassportSizePhoto, file("photo.jpg"))
        .await
        .expect("photo");

    let coordinator = SubmissionCoordinator::new(backend.clone(), drafts.clone());
    let application = wizard.submit(&coordinator).await.expect("submits");
    assert_eq!(wizard.state().step, WizardStep::Completed);
    assert!(drafts.list_drafts().await.expect("lists").is_empty());
    drafts.clear_fallback().await.expect("clears");
    assert!(drafts.recover().await.expect("readable").is_none());

    // Office side.
    let finalizer = AdmissionFinalizer::new(backend.clone(), backend.clone(), "Student@123")
        .with_flag_order(AccountFlagOrder::TwoPhase);
    let mut case = finalizer
        .load(&application.application_id)
        .await
        .expect("loads");
    case.mark_admitted().expect("admits");
    let admission_number = finalizer
        .suggest_admission_number(2026, "BSc")
        .await
        .expect("suggests");
    assert_eq!(admission_number, "2026BSC0001");

    let account = finalizer
        .save_and_provision(
            &mut case,
            &OfficePlacement {
                department: "BSc".to_string(),
                batch: "2026-2029".to_string(),
                section: "B".to_string(),
                admission_number,
                portal_number: None,
            },
        )
        .await
        .expect("provisions");

    assert_eq!(account.name, "Kiran Kumar");
    assert_eq!(case.state(), AdmissionState::AccountCreated);
    let stored = ApplicationGateway::fetch(backend.as_ref(), &application.application_id)
        .await
        .expect("stored");
    assert_eq!(stored.office_use_only.student_id_generated, "2026BSC0001");
    assert!(stored.office_use_only.student_account_created);
    assert_eq!(backend.accounts.lock().expect("accounts lock").len(), 1);
}
