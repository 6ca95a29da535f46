//! Data models for StrategyForge entities.
//!
//! This module contains the wire structures exchanged with the backend:
//!
//! - `User`: Identity record returned by the auth endpoints and `/me`
//! - `AuthResponse`, `TokenPair`: Credential payloads
//! - Backtest types: `BacktestRequest`, `BacktestResult`, `Strategy`, `UploadResponse`
//! - `Envelope`: The `{success, data, message}` wrapper the backend puts around payloads

pub mod backtest;
pub mod envelope;
pub mod user;

pub use backtest::{BacktestRequest, BacktestResult, Strategy, UploadResponse};
pub use envelope::Envelope;
pub use user::{AuthResponse, TokenPair, User};
