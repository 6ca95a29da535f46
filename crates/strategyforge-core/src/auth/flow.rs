//! Interactive authentication flows.
//!
//! These mirror what the login and verification pages do: toggle the loading
//! flag, call the backend, record the session on success and surface a
//! normalized error message on failure.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::SessionStore;
use crate::api::{error_message, ApiClient, ApiError};
use crate::models::{AuthResponse, User};
use crate::routing::{Navigator, Route};

pub const INVALID_VERIFICATION_LINK: &str = "Invalid verification link";

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Api(#[from] ApiError),
}

/// Check that every required form field has a value
fn require(fields: &[(&str, &str)]) -> Result<(), FlowError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    match missing.as_slice() {
        [] => Ok(()),
        [one] => Err(FlowError::Validation(format!("{} is required", one))),
        many => Err(FlowError::Validation(format!("{} are required", many.join(" and ")))),
    }
}

#[derive(Clone, Debug)]
pub struct AuthFlow {
    api: ApiClient,
    session: SessionStore,
    navigator: Arc<dyn Navigator>,
}

impl AuthFlow {
    pub fn new(api: ApiClient, session: SessionStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            api,
            session,
            navigator,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, FlowError> {
        self.authenticate(async {
            require(&[("Email", email), ("Password", password)])?;
            Ok::<_, FlowError>(self.api.login(email.trim(), password).await?)
        })
        .await
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<User, FlowError> {
        self.authenticate(async {
            require(&[("Name", name), ("Email", email), ("Password", password)])?;
            Ok::<_, FlowError>(self.api.register(email.trim(), password, name.trim()).await?)
        })
        .await
    }

    /// Complete a magic-link login. A missing token fails without a network call.
    pub async fn verify_magic_link(&self, token: Option<&str>) -> Result<User, FlowError> {
        self.authenticate(async {
            let token = token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| FlowError::Validation(INVALID_VERIFICATION_LINK.to_string()))?;
            Ok::<_, FlowError>(self.api.verify_magic_link(token).await?)
        })
        .await
    }

    pub async fn send_magic_link(&self, email: &str) -> Result<(), FlowError> {
        self.with_feedback(async {
            require(&[("Email", email)])?;
            Ok::<_, FlowError>(self.api.send_magic_link(email.trim()).await?)
        })
        .await
    }

    /// Reload the identity record from `/me`
    pub async fn refresh_profile(&self) -> Result<User, FlowError> {
        let user = self.api.current_user().await?;
        self.session.set_user(user.clone());
        Ok(user)
    }

    /// Best-effort server logout, then clear the local session
    pub async fn logout(&self) {
        if self.session.is_authenticated() {
            self.api.logout().await;
        }
        self.session.logout();
        self.navigator.navigate(Route::Login);
    }

    async fn authenticate<F>(&self, attempt: F) -> Result<User, FlowError>
    where
        F: Future<Output = Result<AuthResponse, FlowError>>,
    {
        let auth = self
            .with_feedback(async {
                let auth = attempt.await?;
                if auth.token.is_empty() || auth.refresh_token.is_empty() {
                    return Err(FlowError::Api(ApiError::InvalidResponse(
                        "Authentication response is missing a token".to_string(),
                    )));
                }
                Ok(auth)
            })
            .await?;
        let user = auth.user.clone();
        self.session.login(auth.user, auth.token, auth.refresh_token);
        info!(user_id = %user.id, "Authenticated");
        self.navigator.navigate(Route::Dashboard);
        Ok(user)
    }

    /// Run an action with the loading flag set, recording any failure message
    async fn with_feedback<T, F>(&self, action: F) -> Result<T, FlowError>
    where
        F: Future<Output = Result<T, FlowError>>,
    {
        self.session.set_loading(true);
        self.session.clear_error();

        let result = action.await;
        if let Err(ref e) = result {
            let message = error_message(e);
            warn!(error = %message, "Authentication action failed");
            self.session.set_error(message);
        }
        self.session.set_loading(false);
        result
    }
}
