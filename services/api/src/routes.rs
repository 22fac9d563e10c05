use std::sync::atomic::Ordering;
use std::sync::Arc;

use admission_portal::workflows::admission::{
    Account, Application, ApplicationId, ApplicationPayload, AttachmentRef, Draft, DraftId,
    DraftSummary, NewAccount, OfficeUsePatch, OwnerId, SavedDraft,
};
use axum::extract::{FromRequestParts, Multipart, Path, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::infra::{AppState, BackendError, PortalBackend};

type Backend = State<Arc<PortalBackend>>;

/// REST endpoints of the portal's collaborators, backed by [`PortalBackend`].
pub fn portal_router(backend: Arc<PortalBackend>) -> Router {
    Router::new()
        .route(
            "/api/drafts",
            post(save_draft_handler).get(list_drafts_handler),
        )
        .route(
            "/api/drafts/:draft_id",
            get(get_draft_handler).delete(delete_draft_handler),
        )
        .route(
            "/api/applications",
            post(create_application_handler).get(list_applications_handler),
        )
        .route(
            "/api/applications/:application_id",
            get(get_application_handler),
        )
        .route(
            "/api/applications/office-use/:application_id",
            post(office_use_handler),
        )
        .route("/api/files/upload", post(upload_handler))
        .route("/api/admin/register-user", post(register_user_handler))
        .with_state(backend)
}

pub(crate) fn with_portal_routes(backend: Arc<PortalBackend>) -> Router {
    portal_router(backend)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = match &self {
            BackendError::NotFound => StatusCode::NOT_FOUND,
            BackendError::Forbidden(_) => StatusCode::FORBIDDEN,
            BackendError::Conflict(_) => StatusCode::CONFLICT,
            BackendError::Invalid(_) => StatusCode::BAD_REQUEST,
            BackendError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Signed-in user taken from `Authorization: Bearer <user>`.
pub(crate) struct Owner(pub(crate) OwnerId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => Ok(Owner(OwnerId(token.to_string()))),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "missing bearer token" })),
            )
                .into_response()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveDraftBody {
    #[serde(default)]
    draft_id: Option<DraftId>,
    #[serde(default)]
    owner: Option<OwnerId>,
    #[serde(default)]
    payload: ApplicationPayload,
}

pub(crate) async fn save_draft_handler(
    State(backend): Backend,
    Owner(owner): Owner,
    Json(body): Json<SaveDraftBody>,
) -> Result<Json<SavedDraft>, BackendError> {
    if let Some(claimed) = body.owner.as_ref().filter(|claimed| *claimed != &owner) {
        return Err(BackendError::Forbidden(format!("owner {claimed}")));
    }
    let saved = backend.save_draft(&owner, body.draft_id, body.payload)?;
    debug!(draft_id = %saved.draft_id, %owner, "draft stored");
    Ok(Json(saved))
}

pub(crate) async fn list_drafts_handler(
    State(backend): Backend,
    Owner(owner): Owner,
) -> Json<Vec<DraftSummary>> {
    Json(backend.drafts_for(&owner))
}

pub(crate) async fn get_draft_handler(
    State(backend): Backend,
    Owner(owner): Owner,
    Path(draft_id): Path<String>,
) -> Result<Json<Draft>, BackendError> {
    backend.draft(&owner, &DraftId(draft_id)).map(Json)
}

pub(crate) async fn delete_draft_handler(
    State(backend): Backend,
    Owner(owner): Owner,
    Path(draft_id): Path<String>,
) -> Result<StatusCode, BackendError> {
    backend.delete_draft(&owner, &DraftId(draft_id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn create_application_handler(
    State(backend): Backend,
    Owner(_): Owner,
    Json(payload): Json<ApplicationPayload>,
) -> Result<(StatusCode, Json<Application>), BackendError> {
    let (application, created) = backend.create_application(payload)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(application)))
}

pub(crate) async fn list_applications_handler(
    State(backend): Backend,
    Owner(_): Owner,
) -> Json<Vec<Application>> {
    Json(backend.applications())
}

pub(crate) async fn get_application_handler(
    State(backend): Backend,
    Owner(_): Owner,
    Path(application_id): Path<String>,
) -> Result<Json<Application>, BackendError> {
    backend.application(&ApplicationId(application_id)).map(Json)
}

pub(crate) async fn office_use_handler(
    State(backend): Backend,
    Owner(_): Owner,
    Path(application_id): Path<String>,
    Json(patch): Json<OfficeUsePatch>,
) -> Result<Json<Application>, BackendError> {
    let application_id = ApplicationId(application_id);
    let updated = backend.update_office_use(&application_id, &patch)?;
    info!(
        %application_id,
        status = updated.status.label(),
        account_flag = updated.office_use_only.student_account_created,
        "office-use data updated"
    );
    Ok(Json(updated))
}

pub(crate) async fn upload_handler(
    State(backend): Backend,
    Owner(_): Owner,
    mut multipart: Multipart,
) -> Result<Json<AttachmentRef>, BackendError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| BackendError::Invalid(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| BackendError::Invalid(err.to_string()))?;
        let attachment = backend.store_file(file_name, content_type, &bytes)?;
        info!(url = %attachment.url, size = bytes.len(), "file stored");
        return Ok(Json(attachment));
    }

    Err(BackendError::Invalid(
        "multipart field 'file' is required".to_string(),
    ))
}

pub(crate) async fn register_user_handler(
    State(backend): Backend,
    Owner(_): Owner,
    Json(account): Json<NewAccount>,
) -> Result<(StatusCode, Json<Account>), BackendError> {
    let account = backend.register_user(account)?;
    info!(email = %account.email, role = %account.role, "user registered");
    Ok((StatusCode::CREATED, Json(account)))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
