//! Typed endpoint methods for the StrategyForge API.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::{ApiError, ApiRequest, Gateway, ProgressFn};
use crate::models::{AuthResponse, BacktestRequest, BacktestResult, Strategy, UploadResponse, User};

/// Multipart field name the upload endpoint reads
const UPLOAD_FIELD: &str = "file";

/// API client for StrategyForge.
/// Clone is cheap - the gateway shares its connection pool and session.
#[derive(Clone, Debug)]
pub struct ApiClient {
    gateway: Gateway,
}

impl ApiClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    // ===== Auth =====

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post("/auth/login")
            .json(&json!({ "email": email, "password": password }))?;
        self.gateway.send_json(&request).await
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post("/auth/register")
            .json(&json!({ "email": email, "password": password, "name": name }))?;
        self.gateway.send_json(&request).await
    }

    /// Ask the backend to email a one-time login link
    pub async fn send_magic_link(&self, email: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("/auth/magic-link").json(&json!({ "email": email }))?;
        self.gateway.send(&request).await
    }

    pub async fn verify_magic_link(&self, token: &str) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post("/auth/verify-magic-link").json(&json!({ "token": token }))?;
        self.gateway.send_json(&request).await
    }

    /// Exchange a Google identity credential. The backend does not issue
    /// tokens for this yet, so the raw payload is returned.
    pub async fn google_oauth(&self, credential: &str) -> Result<serde_json::Value, ApiError> {
        let request = ApiRequest::post("/auth/google-oauth").json(&json!({ "credential": credential }))?;
        self.gateway.send_json(&request).await
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.gateway.send_json(&ApiRequest::get("/me")).await
    }

    /// Best-effort server-side logout. Failures are logged, never returned.
    pub async fn logout(&self) {
        match self.gateway.send(&ApiRequest::post("/auth/logout")).await {
            Ok(()) => debug!("Server session invalidated"),
            Err(e) => warn!(error = %e, "Logout request failed"),
        }
    }

    // ===== Backtesting =====

    /// Upload a data file, reporting progress 0-100 while the body streams
    pub async fn upload_file(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        on_progress: Option<ProgressFn>,
    ) -> Result<UploadResponse, ApiError> {
        let request = ApiRequest::post("/upload")
            .file(UPLOAD_FIELD, file_name, contents, on_progress)
            .mime(upload_mime(file_name));
        self.gateway.send_json(&request).await
    }

    /// Read a file from disk and upload it
    pub async fn upload_path(&self, path: &Path, on_progress: Option<ProgressFn>) -> Result<UploadResponse, ApiError> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        self.upload_file(&file_name, contents, on_progress).await
    }

    pub async fn run_backtest(&self, request: &BacktestRequest) -> Result<serde_json::Value, ApiError> {
        let request = ApiRequest::post("/backtest").json(request)?;
        self.gateway.send_json(&request).await
    }

    pub async fn strategies(&self) -> Result<Vec<Strategy>, ApiError> {
        self.gateway.send_json(&ApiRequest::get("/strategies")).await
    }

    pub async fn backtest_result(&self, id: &str) -> Result<BacktestResult, ApiError> {
        if id.is_empty() || id.contains('/') {
            return Err(ApiError::InvalidRequest(format!("Invalid backtest id: {:?}", id)));
        }
        self.gateway.send_json(&ApiRequest::get(format!("/backtest/{}", id))).await
    }
}

fn upload_mime(file_name: &str) -> &'static str {
    let is_csv = Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        "text/csv"
    } else {
        "application/octet-stream"
    }
}

/// Wrap a closure as an upload progress callback
pub fn progress_callback<F>(f: F) -> ProgressFn
where
    F: Fn(u8) + Send + Sync + 'static,
{
    Arc::new(f)
}
