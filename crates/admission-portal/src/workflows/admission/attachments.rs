use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{AttachmentRef, DocumentKey, SignatureUpload, UploadedFiles};
use super::repository::{FileUploader, RemoteError};

/// Raw file handed to the uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Build an upload, guessing the content type from the file name.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    StudentSignature,
    PassportSizePhoto,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("'{file_name}' is empty")]
    EmptyFile { file_name: String },
    #[error("upload of '{file_name}' failed: {source}")]
    Rejected {
        file_name: String,
        source: RemoteError,
    },
}

/// Turns raw files into attachment references stored against payload slots.
///
/// A failed upload never touches the target section. Replacing a slot does not retract
/// the previously stored remote file.
pub struct AttachmentTracker<U> {
    uploader: Arc<U>,
}

impl<U> AttachmentTracker<U>
where
    U: FileUploader + 'static,
{
    pub fn new(uploader: Arc<U>) -> Self {
        Self { uploader }
    }

    pub async fn upload(&self, file: UploadFile) -> Result<AttachmentRef, UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::EmptyFile {
                file_name: file.file_name,
            });
        }

        let file_name = file.file_name.clone();
        match self.uploader.upload(file).await {
            Ok(attachment) => {
                info!(%file_name, url = %attachment.url, "attachment uploaded");
                Ok(attachment)
            }
            Err(source) => {
                warn!(%file_name, error = %source, "attachment upload failed");
                Err(UploadError::Rejected { file_name, source })
            }
        }
    }

    /// Upload and store under `key`, returning the reference it replaced.
    pub async fn attach(
        &self,
        key: DocumentKey,
        file: UploadFile,
        files: &mut UploadedFiles,
    ) -> Result<Option<AttachmentRef>, UploadError> {
        let attachment = self.upload(file).await?;
        Ok(files.set(key, attachment))
    }

    pub async fn attach_signature(
        &self,
        kind: SignatureKind,
        file: UploadFile,
        signatures: &mut SignatureUpload,
    ) -> Result<Option<AttachmentRef>, UploadError> {
        let attachment = self.upload(file).await?;
        let slot = match kind {
            SignatureKind::StudentSignature => &mut signatures.student_signature,
            SignatureKind::PassportSizePhoto => &mut signatures.passport_size_photo,
        };
        Ok(slot.replace(attachment))
    }
}
