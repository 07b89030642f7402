use async_trait::async_trait;
use jot_core::Note;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy for remote calls.
///
/// Transient failures preserve the queue entry and are retried with
/// backoff; rejections discard it, since re-attempting can never succeed.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transient remote failure: {0}")]
    Transient(String),

    #[error("remote rejected the operation: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

/// The remote authoritative store: CRUD over the authenticated user's
/// notes. Calls are atomic per-operation and return a definitive
/// success or failure, never partial success.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All of the user's notes, newest first
    async fn list(&self) -> Result<Vec<Note>, RemoteError>;

    /// Create or update a note; returns the server's copy
    async fn upsert(&self, note: &Note) -> Result<Note, RemoteError>;

    async fn delete(&self, id: Uuid) -> Result<(), RemoteError>;
}

/// HTTP implementation against the jot server's JSON API
pub struct HttpRemote {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(
        server_url: &str,
        auth_token: Option<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            auth_token,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn list(&self) -> Result<Vec<Note>, RemoteError> {
        let response = self
            .authorize(self.client.get(self.url("api/notes")))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        response
            .json::<Vec<Note>>()
            .await
            .map_err(|e| RemoteError::Rejected(format!("invalid response body: {e}")))
    }

    async fn upsert(&self, note: &Note) -> Result<Note, RemoteError> {
        let response = self
            .authorize(self.client.put(self.url(&format!("api/notes/{}", note.id))))
            .json(note)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        response
            .json::<Note>()
            .await
            .map_err(|e| RemoteError::Rejected(format!("invalid response body: {e}")))
    }

    async fn delete(&self, id: Uuid) -> Result<(), RemoteError> {
        let response = self
            .authorize(self.client.delete(self.url(&format!("api/notes/{id}"))))
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}

/// Network-level trouble (timeout, refused connection, reset) is always
/// worth retrying later
fn transport_error(err: reqwest::Error) -> RemoteError {
    RemoteError::Transient(err.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(status_error(status, &detail))
}

/// 5xx, 408 and 429 are the server's problem and may clear up; every
/// other non-success status is a definitive rejection
fn status_error(status: StatusCode, detail: &str) -> RemoteError {
    let message = if detail.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {detail}")
    };
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        RemoteError::Transient(message)
    } else {
        RemoteError::Rejected(message)
    }
}
