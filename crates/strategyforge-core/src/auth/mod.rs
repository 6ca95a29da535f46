//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionStore`: The shared session cell and its actions
//! - `SessionStorage`: Persistence backends (file, OS keychain, memory)
//! - `AuthFlow`: Login, registration, magic-link and logout flows
//!
//! Only the user record and the token pair survive a restart.

pub mod flow;
pub mod session;
pub mod storage;

pub use flow::{AuthFlow, FlowError};
pub use session::{SessionState, SessionStore};
pub use storage::{
    FileStorage, KeyringStorage, MemoryStorage, PersistedSession, SessionStorage, StorageError,
    STORAGE_KEY,
};
