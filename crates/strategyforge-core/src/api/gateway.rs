//! Request pipeline shared by every backend call.
//!
//! Each request passes through three stages:
//!
//! 1. `attach_credentials`: read the access token from the session
//! 2. `dispatch`: send the request, mapping non-success statuses to `ApiError`
//! 3. `recover_unauthorized`: on a 401, refresh the token pair once and replay
//!
//! The refresh call bypasses stages 1 and 3 so it can never recurse.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ApiError;
use crate::auth::SessionStore;
use crate::config::Config;
use crate::models::{Envelope, TokenPair};
use crate::routing::{Navigator, Route};

/// Size of each chunk streamed for file uploads
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

const REFRESH_PATH: &str = "/auth/refresh";

/// Upload progress callback, called with a percentage in `0..=100`
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// How concurrent 401s share token refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshPolicy {
    /// Every failing request refreshes on its own
    #[default]
    Independent,
    /// Concurrent refreshes are serialized; late arrivals reuse the fresh token
    SingleFlight,
}

impl RefreshPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" => Some(RefreshPolicy::Independent),
            "single-flight" | "single_flight" | "singleflight" => Some(RefreshPolicy::SingleFlight),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    File {
        field: String,
        file_name: String,
        mime: Option<String>,
        contents: Arc<[u8]>,
        progress: Option<ProgressFn>,
    },
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Json(value) => f.debug_tuple("Json").field(value).finish(),
            RequestBody::File {
                field,
                file_name,
                contents,
                ..
            } => f
                .debug_struct("File")
                .field("field", field)
                .field("file_name", file_name)
                .field("len", &contents.len())
                .finish_non_exhaustive(),
        }
    }
}

/// A request description that can be rebuilt for a replay.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        contents: impl Into<Arc<[u8]>>,
        progress: Option<ProgressFn>,
    ) -> Self {
        self.body = RequestBody::File {
            field: field.into(),
            file_name: file_name.into(),
            mime: None,
            contents: contents.into(),
            progress,
        };
        self
    }

    /// Set the content type of the file part. No effect on other bodies.
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        if let RequestBody::File { mime: ref mut slot, .. } = self.body {
            *slot = Some(mime.into());
        }
        self
    }
}

/// Recovery state for a request that failed with 401.
enum RetryState {
    Initial { error: ApiError },
    Refreshing { refresh_token: String },
    Retried { access_token: String },
}

impl RetryState {
    fn name(&self) -> &'static str {
        match self {
            RetryState::Initial { .. } => "initial",
            RetryState::Refreshing { .. } => "refreshing",
            RetryState::Retried { .. } => "retried",
        }
    }
}

/// Authenticated HTTP pipeline.
/// Clone is cheap - clones share the connection pool, session and refresh lock.
#[derive(Clone)]
pub struct Gateway {
    client: Client,
    base_url: String,
    session: SessionStore,
    navigator: Arc<dyn Navigator>,
    policy: RefreshPolicy,
    refresh_lock: Arc<Mutex<()>>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(
        config: &Config,
        session: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session,
            navigator,
            policy: config.refresh_policy,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Run a request through the full pipeline
    pub async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let token = self.attach_credentials();
        match self.dispatch(request, token.as_deref()).await {
            Err(error) if error.is_unauthorized() => {
                self.recover_unauthorized(request, token, error).await
            }
            other => other,
        }
    }

    /// Run a request and decode its (possibly enveloped) JSON payload
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        Self::decode(response).await
    }

    /// Run a request and discard the response body
    pub async fn send(&self, request: &ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    // ===== Stages =====

    fn attach_credentials(&self) -> Option<String> {
        self.session.access_token().filter(|t| !t.is_empty())
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        debug!(method = %request.method, path = %request.path, authenticated = token.is_some(), "Dispatching request");

        let mut builder = self.client.request(request.method.clone(), self.url(&request.path));
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::File {
                field,
                file_name,
                mime,
                contents,
                progress,
            } => {
                let mut part = Part::stream_with_length(
                    upload_body(contents.clone(), progress.clone()),
                    contents.len() as u64,
                )
                .file_name(file_name.clone());
                if let Some(mime) = mime {
                    part = part
                        .mime_str(mime)
                        .map_err(|e| ApiError::InvalidRequest(format!("Invalid MIME type: {}", e)))?;
                }
                builder.multipart(Form::new().part(field.clone(), part))
            }
        };

        let response = builder.send().await?;
        Self::check_response(response).await
    }

    async fn recover_unauthorized(
        &self,
        request: &ApiRequest,
        failed_token: Option<String>,
        error: ApiError,
    ) -> Result<Response, ApiError> {
        let mut state = RetryState::Initial { error };
        loop {
            debug!(path = %request.path, state = state.name(), "Recovering from 401");
            state = match state {
                RetryState::Initial { error } => {
                    match self.session.refresh_token().filter(|t| !t.is_empty()) {
                        Some(refresh_token) => RetryState::Refreshing { refresh_token },
                        None => {
                            debug!(path = %request.path, "No refresh token, giving up");
                            return Err(error);
                        }
                    }
                }
                RetryState::Refreshing { refresh_token } => {
                    match self.obtain_token(&refresh_token, failed_token.as_deref()).await {
                        Ok(access_token) => RetryState::Retried { access_token },
                        Err(refresh_error) => {
                            warn!(error = %refresh_error, "Token refresh failed, ending session");
                            self.session.logout();
                            self.navigator.navigate(Route::Login);
                            return Err(ApiError::RefreshFailed(Box::new(refresh_error)));
                        }
                    }
                }
                RetryState::Retried { access_token } => {
                    return self.dispatch(request, Some(&access_token)).await;
                }
            };
        }
    }

    async fn obtain_token(&self, refresh_token: &str, failed_token: Option<&str>) -> Result<String, ApiError> {
        match self.policy {
            RefreshPolicy::Independent => self.refresh(refresh_token).await,
            RefreshPolicy::SingleFlight => {
                let _guard = self.refresh_lock.lock().await;
                let state = self.session.snapshot();
                if let Some(current) = state.access_token.filter(|t| !t.is_empty()) {
                    if state.is_authenticated && Some(current.as_str()) != failed_token {
                        debug!("Token already refreshed by a concurrent request");
                        return Ok(current);
                    }
                }
                let refresh_token = state
                    .refresh_token
                    .filter(|t| !t.is_empty())
                    .ok_or(ApiError::NoRefreshToken)?;
                self.refresh(&refresh_token).await
            }
        }
    }

    /// Exchange a refresh token for a new token pair and store it.
    ///
    /// Sent straight through the transport: no bearer header and no 401 recovery.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let pair: TokenPair = Self::decode(response).await?;

        if pair.token.is_empty() {
            return Err(ApiError::InvalidResponse("Refresh returned an empty access token".to_string()));
        }
        if pair.refresh_token.is_empty() {
            return Err(ApiError::InvalidResponse("Refresh returned an empty refresh token".to_string()));
        }

        self.session.set_tokens(pair.token.clone(), pair.refresh_token);
        info!("Access token refreshed");
        Ok(pair.token)
    }

    // ===== Helpers =====

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Request rejected");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str::<Envelope<T>>(&text)
            .map(Envelope::into_inner)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

/// Stream file contents in chunks, reporting the share sent so far.
fn upload_body(contents: Arc<[u8]>, progress: Option<ProgressFn>) -> Body {
    let total = contents.len();
    let starts: Vec<usize> = (0..total).step_by(UPLOAD_CHUNK_SIZE).collect();
    let mut loaded = 0usize;

    let chunks = stream::iter(starts).map(move |start| {
        let end = (start + UPLOAD_CHUNK_SIZE).min(total);
        loaded += end - start;
        if let Some(ref report) = progress {
            report(percent(loaded, total));
        }
        Ok::<Vec<u8>, std::io::Error>(contents[start..end].to_vec())
    });

    Body::wrap_stream(chunks)
}

fn percent(loaded: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((loaded as f64 * 100.0) / total as f64).round().min(100.0) as u8
}
