use std::error::Error as StdError;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Message returned when nothing more specific can be found
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred";

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Structured rejection body produced by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed with status code {}", .status.as_u16())]
    Status {
        status: StatusCode,
        body: Option<ErrorBody>,
        raw: String,
    },

    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error(transparent)]
    RefreshFailed(Box<ApiError>),
}

/// The four failure classes a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, timeout or undecodable traffic
    Transport,
    /// The backend answered with a non-success status other than 401
    Rejected,
    /// 401 that could be recovered by a token refresh
    AuthExpired,
    /// The refresh itself failed and the session was cleared
    RefreshFailed,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .filter(|b| b.message.is_some() || b.error.is_some());
        ApiError::Status {
            status,
            body: parsed,
            raw: Self::truncate_body(body),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            ApiError::RefreshFailed(inner) => inner.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::RefreshFailed(_) => ErrorKind::RefreshFailed,
            e if e.is_unauthorized() => ErrorKind::AuthExpired,
            ApiError::Status { .. } | ApiError::NoRefreshToken => ErrorKind::Rejected,
            ApiError::Network(_) | ApiError::InvalidResponse(_) | ApiError::InvalidRequest(_) => {
                ErrorKind::Transport
            }
        }
    }

    /// The structured body attached to a backend rejection, if any
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            ApiError::Status { body, .. } => body.as_ref(),
            ApiError::RefreshFailed(inner) => inner.body(),
            _ => None,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Resolve a human-readable message for any failure.
///
/// Looks for an `ApiError` anywhere in the source chain and prefers the
/// backend's `message` field, then its `error` field, then the underlying
/// error text. Falls back to [`FALLBACK_MESSAGE`].
pub fn error_message(err: &(dyn StdError + 'static)) -> String {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(api) = e.downcast_ref::<ApiError>() {
            if let Some(body) = api.body() {
                if let Some(msg) = body.message.as_deref().and_then(non_empty) {
                    return msg;
                }
                if let Some(msg) = body.error.as_deref().and_then(non_empty) {
                    return msg;
                }
            }
            break;
        }
        current = e.source();
    }

    non_empty(&err.to_string()).unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}
