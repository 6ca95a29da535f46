//! StrategyForge core library.
//!
//! Session management and the authenticated API client shared by the
//! StrategyForge front ends:
//!
//! - [`auth`]: session store, persistence and login flows
//! - [`api`]: request pipeline with one-shot token refresh, typed endpoints
//! - [`routing`]: client-side route protection
//! - [`config`]: configuration file and environment overrides
//! - [`models`]: wire models

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod routing;

use std::sync::Arc;

use thiserror::Error;

pub use api::{ApiClient, ApiError, Gateway};
pub use auth::{AuthFlow, SessionStore};
pub use config::Config;
pub use routing::{Navigator, Route};

#[derive(Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Everything a front end needs, wired around one shared session.
#[derive(Clone, Debug)]
pub struct Context {
    pub config: Config,
    pub session: SessionStore,
    pub api: ApiClient,
    pub auth: AuthFlow,
}

impl Context {
    /// Hydrate the session from the configured storage and build the client
    pub fn from_config(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self, InitError> {
        let session = SessionStore::hydrate(config.session_storage()?);
        Ok(Self::with_session(config, session, navigator)?)
    }

    pub fn with_session(config: Config, session: SessionStore, navigator: Arc<dyn Navigator>) -> Result<Self, ApiError> {
        let gateway = Gateway::new(&config, session.clone(), navigator.clone())?;
        let api = ApiClient::new(gateway);
        let auth = AuthFlow::new(api.clone(), session.clone(), navigator);
        Ok(Self {
            config,
            session,
            api,
            auth,
        })
    }
}
