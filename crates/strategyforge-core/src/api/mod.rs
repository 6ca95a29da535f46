//! REST API client module for the StrategyForge backend.
//!
//! This module provides the `Gateway` request pipeline (bearer attachment and
//! one-shot token refresh) and the `ApiClient` with one method per endpoint.
//!
//! The API uses JWT bearer tokens obtained from `/auth/login`, `/auth/register`
//! or `/auth/verify-magic-link` and renewed through `/auth/refresh`.

pub mod client;
pub mod error;
pub mod gateway;

pub use client::{progress_callback, ApiClient};
pub use error::{error_message, ApiError, ErrorBody, ErrorKind, FALLBACK_MESSAGE};
pub use gateway::{ApiRequest, Gateway, ProgressFn, RefreshPolicy, RequestBody};
