use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::admission::{
    DraftStoreError, FinalizationError, RemoteError, SubmissionError, UploadError, WizardError,
    WizardSubmitError,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Remote(RemoteError),
    Drafts(DraftStoreError),
    Upload(UploadError),
    Wizard(WizardError),
    Submission(SubmissionError),
    Finalization(FinalizationError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Remote(err) => write!(f, "portal error: {}", err),
            AppError::Drafts(err) => write!(f, "draft error: {}", err),
            AppError::Upload(err) => write!(f, "upload error: {}", err),
            AppError::Wizard(err) => write!(f, "wizard error: {}", err),
            AppError::Submission(err) => write!(f, "submission error: {}", err),
            AppError::Finalization(err) => write!(f, "finalization error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Remote(err) => Some(err),
            AppError::Drafts(err) => Some(err),
            AppError::Upload(err) => Some(err),
            AppError::Wizard(err) => Some(err),
            AppError::Submission(err) => Some(err),
            AppError::Finalization(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Drafts(DraftStoreError::NotFound(_)) | AppError::Remote(RemoteError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            AppError::Wizard(_)
            | AppError::Upload(UploadError::EmptyFile { .. })
            | AppError::Finalization(FinalizationError::Validation(_))
            | AppError::Finalization(FinalizationError::NotAdmitted(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Finalization(FinalizationError::AlreadyProvisioned(_)) => StatusCode::CONFLICT,
            AppError::Remote(_)
            | AppError::Drafts(_)
            | AppError::Upload(_)
            | AppError::Submission(_)
            | AppError::Finalization(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RemoteError> for AppError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}

impl From<DraftStoreError> for AppError {
    fn from(value: DraftStoreError) -> Self {
        Self::Drafts(value)
    }
}

impl From<UploadError> for AppError {
    fn from(value: UploadError) -> Self {
        Self::Upload(value)
    }
}

impl From<WizardError> for AppError {
    fn from(value: WizardError) -> Self {
        Self::Wizard(value)
    }
}

impl From<SubmissionError> for AppError {
    fn from(value: SubmissionError) -> Self {
        Self::Submission(value)
    }
}

impl From<WizardSubmitError> for AppError {
    fn from(value: WizardSubmitError) -> Self {
        match value {
            WizardSubmitError::Wizard(err) => Self::Wizard(err),
            WizardSubmitError::Submission(err) => Self::Submission(err),
        }
    }
}

impl From<FinalizationError> for AppError {
    fn from(value: FinalizationError) -> Self {
        Self::Finalization(value)
    }
}
