use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Server-assigned identifier of a saved draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(pub String);

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-facing application number, distinct from the database id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the signed-in user that owns drafts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable pointer to a previously uploaded file. Provider metadata is kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub url: String,
    #[serde(default)]
    pub original_name: String,
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl AttachmentRef {
    pub fn new(url: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            original_name: original_name.into(),
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentDetails {
    pub student_name: String,
    pub father_name: String,
    pub mother_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub aadhaar_number: String,
    pub nationality: String,
    pub religion: String,
    pub caste: String,
    pub mother_tongue: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressDetails {
    pub house_no: String,
    pub street: String,
    pub village: String,
    pub mandal: String,
    pub district: String,
    pub pin_code: String,
    pub state: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactDetails {
    pub mobile_no: String,
    pub email: String,
    pub alternate_mobile_no: String,
    pub parent_mobile_no: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Supporting documents collected in the second phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKey {
    SscMemo,
    InterMemo,
    TransferCertificate,
    StudyCertificate,
    CasteCertificate,
    IncomeCertificate,
    AadhaarCard,
    RationCard,
}

impl DocumentKey {
    pub const ALL: [DocumentKey; 8] = [
        DocumentKey::SscMemo,
        DocumentKey::InterMemo,
        DocumentKey::TransferCertificate,
        DocumentKey::StudyCertificate,
        DocumentKey::CasteCertificate,
        DocumentKey::IncomeCertificate,
        DocumentKey::AadhaarCard,
        DocumentKey::RationCard,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            DocumentKey::SscMemo => "sscMemo",
            DocumentKey::InterMemo => "interMemo",
            DocumentKey::TransferCertificate => "transferCertificate",
            DocumentKey::StudyCertificate => "studyCertificate",
            DocumentKey::CasteCertificate => "casteCertificate",
            DocumentKey::IncomeCertificate => "incomeCertificate",
            DocumentKey::AadhaarCard => "aadhaarCard",
            DocumentKey::RationCard => "rationCard",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DocumentKey::SscMemo => "SSC marks memo",
            DocumentKey::InterMemo => "Intermediate marks memo",
            DocumentKey::TransferCertificate => "Transfer certificate",
            DocumentKey::StudyCertificate => "Study certificate",
            DocumentKey::CasteCertificate => "Caste certificate",
            DocumentKey::IncomeCertificate => "Income certificate",
            DocumentKey::AadhaarCard => "Aadhaar card",
            DocumentKey::RationCard => "Ration card",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.key() == raw)
    }
}

/// Document slots keyed by the fixed [`DocumentKey`] set. Every key is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UploadedFiles(BTreeMap<DocumentKey, Option<AttachmentRef>>);

impl Default for UploadedFiles {
    fn default() -> Self {
        Self(DocumentKey::ALL.into_iter().map(|key| (key, None)).collect())
    }
}

impl UploadedFiles {
    pub fn get(&self, key: DocumentKey) -> Option<&AttachmentRef> {
        self.0.get(&key).and_then(Option::as_ref)
    }

    /// Store a reference, returning the one it replaced.
    pub fn set(&mut self, key: DocumentKey, attachment: AttachmentRef) -> Option<AttachmentRef> {
        self.0.insert(key, Some(attachment)).flatten()
    }

    pub fn clear(&mut self, key: DocumentKey) -> Option<AttachmentRef> {
        self.0.insert(key, None).flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentKey, Option<&AttachmentRef>)> {
        self.0.iter().map(|(key, value)| (*key, value.as_ref()))
    }

    pub fn attached_count(&self) -> usize {
        self.0.values().filter(|value| value.is_some()).count()
    }
}

impl<'de> Deserialize<'de> for UploadedFiles {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let provided = BTreeMap::<String, Option<AttachmentRef>>::deserialize(deserializer)?;
        let mut files = Self::default();
        for (raw_key, attachment) in provided {
            if let Some(key) = DocumentKey::from_key(&raw_key) {
                files.0.insert(key, attachment);
            }
        }
        Ok(files)
    }
}

pub const STUDY_YEARS: usize = 7;

/// Class labels for the trailing academic years, oldest first. Not user-editable.
pub const STUDY_CLASS_LABELS: [&str; STUDY_YEARS] = [
    "6th Class",
    "7th Class",
    "8th Class",
    "9th Class",
    "10th Class",
    "Intermediate 1st Year",
    "Intermediate 2nd Year",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudyRecord {
    pub school_college_name: String,
    pub academic_year: String,
    pub place: String,
}

/// Exactly [`STUDY_YEARS`] rows; shorter or longer input is padded or truncated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StudyDetails([StudyRecord; STUDY_YEARS]);

impl StudyDetails {
    pub fn rows(&self) -> impl Iterator<Item = (&'static str, &StudyRecord)> {
        STUDY_CLASS_LABELS.into_iter().zip(self.0.iter())
    }

    pub fn record(&self, index: usize) -> Option<&StudyRecord> {
        self.0.get(index)
    }

    /// Replace one row. Returns `false` when the index is outside the fixed range.
    pub fn set(&mut self, index: usize, record: StudyRecord) -> bool {
        match self.0.get_mut(index) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }
}

impl<'de> Deserialize<'de> for StudyDetails {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let provided = Vec::<StudyRecord>::deserialize(deserializer)?;
        let mut details = Self::default();
        for (slot, record) in details.0.iter_mut().zip(provided) {
            *slot = record;
        }
        Ok(details)
    }
}

pub const COLLEGE_PREFERENCE_SLOTS: usize = 5;

/// Ranked college choices, always [`COLLEGE_PREFERENCE_SLOTS`] long.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CollegePreferences([String; COLLEGE_PREFERENCE_SLOTS]);

impl CollegePreferences {
    pub fn from_ranked<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut preferences = Self::default();
        for (slot, choice) in preferences.0.iter_mut().zip(choices) {
            *slot = choice.into();
        }
        preferences
    }

    pub fn ranked(&self) -> &[String] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CollegePreferences {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let provided = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_ranked(provided))
    }
}

pub const BSC_DEGREE_GROUP: &str = "BSc";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub second_language: String,
    pub degree_group: String,
    pub bsc_specializations: BTreeSet<String>,
    pub college_preferences: CollegePreferences,
}

impl Preferences {
    pub fn is_bsc(&self) -> bool {
        self.degree_group == BSC_DEGREE_GROUP
    }

    /// Switching groups keeps any specializations picked under a previous BSc selection.
    pub fn select_degree_group(&mut self, group: impl Into<String>) {
        self.degree_group = group.into();
    }

    /// Toggle a specialization. A no-op outside the BSc group; returns whether anything changed.
    pub fn toggle_bsc_specialization(&mut self, specialization: &str) -> bool {
        if !self.is_bsc() {
            return false;
        }
        if !self.bsc_specializations.remove(specialization) {
            self.bsc_specializations.insert(specialization.to_string());
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignatureUpload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_signature: Option<AttachmentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_size_photo: Option<AttachmentRef>,
}

/// Accumulated wizard state. Also the shape of a draft payload and a submitted application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationPayload {
    pub student_details: StudentDetails,
    pub address_details: AddressDetails,
    pub contact_details: ContactDetails,
    pub other_details: BTreeMap<String, Value>,
    pub uploaded_files: UploadedFiles,
    pub study_details: StudyDetails,
    pub preferences: Preferences,
    pub signature_upload: SignatureUpload,
}

impl ApplicationPayload {
    /// Shallow per-section overwrite: each section present in the patch replaces the old one.
    pub fn merge(&mut self, patch: PayloadPatch) {
        let PayloadPatch {
            student_details,
            address_details,
            contact_details,
            other_details,
            uploaded_files,
            study_details,
            preferences,
            signature_upload,
        } = patch;

        if let Some(section) = student_details {
            self.student_details = section;
        }
        if let Some(section) = address_details {
            self.address_details = section;
        }
        if let Some(section) = contact_details {
            self.contact_details = section;
        }
        if let Some(section) = other_details {
            self.other_details = section;
        }
        if let Some(section) = uploaded_files {
            self.uploaded_files = section;
        }
        if let Some(section) = study_details {
            self.study_details = section;
        }
        if let Some(section) = preferences {
            self.preferences = section;
        }
        if let Some(section) = signature_upload {
            self.signature_upload = section;
        }
    }
}

/// Sections entered in one step. Absent sections leave the payload untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayloadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_details: Option<StudentDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_details: Option<AddressDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_details: Option<ContactDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_details: Option<BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_files: Option<UploadedFiles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_details: Option<StudyDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_upload: Option<SignatureUpload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub draft_id: DraftId,
    pub owner: OwnerId,
    #[serde(default)]
    pub payload: ApplicationPayload,
    pub saved_at: DateTime<Utc>,
}

impl Draft {
    pub fn summary(&self) -> DraftSummary {
        DraftSummary {
            draft_id: self.draft_id.clone(),
            owner: self.owner.clone(),
            saved_at: self.saved_at,
            student_name: self.payload.student_details.student_name.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// Listing entry for the "my drafts" screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub draft_id: DraftId,
    pub owner: OwnerId,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub payload: ApplicationPayload,
}

/// Body of a create-or-replace draft call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDraftRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<DraftId>,
    pub owner: OwnerId,
    pub payload: ApplicationPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDraft {
    pub draft_id: DraftId,
    pub saved_at: DateTime<Utc>,
}

/// Office-managed status of a submitted application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Submitted,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfficeUseOnly {
    pub student_id_generated: String,
    pub portal_number: String,
    pub department: String,
    pub batch: String,
    pub section: String,
    pub student_account_created: bool,
}

impl OfficeUseOnly {
    pub fn apply(&mut self, patch: &OfficeUsePatch) {
        if let Some(value) = &patch.student_id_generated {
            self.student_id_generated = value.clone();
        }
        if let Some(value) = &patch.portal_number {
            self.portal_number = value.clone();
        }
        if let Some(value) = &patch.department {
            self.department = value.clone();
        }
        if let Some(value) = &patch.batch {
            self.batch = value.clone();
        }
        if let Some(value) = &patch.section {
            self.section = value.clone();
        }
        if let Some(value) = patch.student_account_created {
            self.student_account_created = value;
        }
    }
}

/// Partial office-use update; only populated fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfficeUsePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id_generated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_account_created: Option<bool>,
}

/// Server-authoritative record created from a submitted payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub application_id: ApplicationId,
    pub payload: ApplicationPayload,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub office_use_only: OfficeUseOnly,
    pub submitted_at: DateTime<Utc>,
}

pub const STUDENT_ROLE: &str = "student";

/// Registration request for a student login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub department: String,
    pub batch: String,
    pub section: String,
    pub phone: String,
    pub enrollment_id: String,
}

/// Provisioned login identity, as echoed back by the registration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    pub email: String,
    pub role: String,
    pub department: String,
    pub batch: String,
    pub section: String,
    pub phone: String,
    pub enrollment_id: String,
}
