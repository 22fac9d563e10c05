//! HTTP client for the portal's REST collaborators.
//!
//! Every call carries the bearer token when one is configured. A 404 maps to
//! [`RemoteError::NotFound`]; any other non-2xx status keeps its code and body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::attachments::UploadFile;
use super::domain::{
    Account, Application, ApplicationId, ApplicationPayload, AttachmentRef, Draft, DraftId,
    DraftSummary, NewAccount, OfficeUsePatch, OwnerId, SaveDraftRequest, SavedDraft,
};
use super::repository::{
    AccountProvisioner, ApplicationGateway, DraftService, FileUploader, RemoteError,
};
use crate::config::PortalConfig;

/// Longest error body kept in a [`RemoteError::Status`].
const MAX_ERROR_BODY_LENGTH: usize = 200;

#[derive(Debug, Clone)]
pub struct PortalClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl PortalClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RemoteError::Transport(format!("failed to build http client: {err}")))?;
        Ok(Self::with_client(client, base_url, token))
    }

    pub fn from_config(config: &PortalConfig) -> Result<Self, RemoteError> {
        Self::new(
            config.base_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        )
    }

    /// Reuse an existing client, e.g. to share a connection pool between identities.
    pub fn with_client(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token,
        }
    }

    /// Same backend, different signed-in identity.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `path` followed by `id` as a single percent-encoded segment.
    fn resource_url(&self, path: &str, id: &str) -> Result<Url, RemoteError> {
        let raw = self.url(path);
        let mut url = Url::parse(&raw)
            .map_err(|err| RemoteError::Transport(format!("invalid url '{raw}': {err}")))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport(format!("url '{raw}' cannot take path segments")))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self.authorized(builder).send().await.map_err(transport)?;
        ensure_success(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RemoteError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))
    }
}

fn transport(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Transport(format!("request timed out: {err}"))
    } else {
        RemoteError::Transport(err.to_string())
    }
}

async fn ensure_success(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(RemoteError::Status {
        status: status.as_u16(),
        body: truncate_body(body),
    })
}

fn truncate_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body;
    }
    let mut cut = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated)", &body[..cut])
}

#[async_trait]
impl DraftService for PortalClient {
    async fn save(&self, request: SaveDraftRequest) -> Result<SavedDraft, RemoteError> {
        self.send_json(self.client.post(self.url("/api/drafts")).json(&request))
            .await
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<DraftSummary>, RemoteError> {
        let drafts: Vec<DraftSummary> = self
            .send_json(self.client.get(self.url("/api/drafts")))
            .await?;
        Ok(drafts
            .into_iter()
            .filter(|draft| &draft.owner == owner)
            .collect())
    }

    async fn fetch(&self, draft_id: &DraftId) -> Result<Draft, RemoteError> {
        let url = self.resource_url("/api/drafts", &draft_id.0)?;
        self.send_json(self.client.get(url)).await
    }

    async fn delete(&self, draft_id: &DraftId) -> Result<(), RemoteError> {
        let url = self.resource_url("/api/drafts", &draft_id.0)?;
        self.send(self.client.delete(url)).await.map(|_| ())
    }
}

#[async_trait]
impl FileUploader for PortalClient {
    async fn upload(&self, file: UploadFile) -> Result<AttachmentRef, RemoteError> {
        let UploadFile {
            file_name,
            content_type,
            bytes,
        } = file;
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&content_type)
            .map_err(|err| RemoteError::Transport(format!("invalid content type: {err}")))?;
        let form = Form::new().part("file", part);
        self.send_json(self.client.post(self.url("/api/files/upload")).multipart(form))
            .await
    }
}

#[async_trait]
impl ApplicationGateway for PortalClient {
    async fn create(&self, payload: &ApplicationPayload) -> Result<Application, RemoteError> {
        self.send_json(self.client.post(self.url("/api/applications")).json(payload))
            .await
    }

    async fn fetch(&self, application_id: &ApplicationId) -> Result<Application, RemoteError> {
        let url = self.resource_url("/api/applications", &application_id.0)?;
        self.send_json(self.client.get(url)).await
    }

    async fn list(&self) -> Result<Vec<Application>, RemoteError> {
        self.send_json(self.client.get(self.url("/api/applications")))
            .await
    }

    async fn update_office_use(
        &self,
        application_id: &ApplicationId,
        patch: &OfficeUsePatch,
    ) -> Result<Application, RemoteError> {
        let url = self.resource_url("/api/applications/office-use", &application_id.0)?;
        self.send_json(self.client.post(url).json(patch)).await
    }
}

#[async_trait]
impl AccountProvisioner for PortalClient {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, RemoteError> {
        self.send_json(
            self.client
                .post(self.url("/api/admin/register-user"))
                .json(account),
        )
        .await
    }
}
