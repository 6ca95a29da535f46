//! Client-side route protection.
//!
//! Pages behind authentication resolve to the login page while the session
//! is unauthenticated. The gateway uses a [`Navigator`] to send the user back
//! to login when a session cannot be recovered.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::auth::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Verify,
    Dashboard,
    Backtest,
    Result(String),
}

impl Route {
    /// Parse a client path. `/` lands on the dashboard; unknown paths are `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Some(Route::Dashboard),
            "/login" => Some(Route::Login),
            "/verify" => Some(Route::Verify),
            "/dashboard" => Some(Route::Dashboard),
            "/backtest" => Some(Route::Backtest),
            _ => trimmed
                .strip_prefix("/result/")
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Route::Result(id.to_string())),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Verify => "/verify".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Backtest => "/backtest".to_string(),
            Route::Result(id) => format!("/result/{}", id),
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard | Route::Backtest | Route::Result(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Resolve where a navigation request actually lands.
pub fn guard(route: Route, session: &SessionStore) -> Route {
    let authenticated = session.snapshot().has_credentials();
    match route {
        r if r.is_protected() && !authenticated => {
            debug!(requested = %r, "Redirecting unauthenticated user to login");
            Route::Login
        }
        Route::Login if authenticated => Route::Dashboard,
        r => r,
    }
}

pub trait Navigator: Send + Sync + fmt::Debug {
    fn navigate(&self, route: Route);
}

/// Records navigation history in memory.
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<Route>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Route> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn history(&self) -> Vec<Route> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, route: Route) {
        debug!(route = %route, "Navigate");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn signed_in() -> SessionStore {
        let store = SessionStore::new();
        store.login(
            User {
                id: "u-1".to_string(),
                email: "ada@example.com".to_string(),
                name: "Ada".to_string(),
                avatar: None,
                is_pro: false,
                is_verified: true,
                last_login_at: None,
                created_at: None,
                updated_at: None,
            },
            "access".to_string(),
            "refresh".to_string(),
        );
        store
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(Route::parse("/"), Some(Route::Dashboard));
        assert_eq!(Route::parse("/login"), Some(Route::Login));
        assert_eq!(Route::parse("/verify?token=abc"), Some(Route::Verify));
        assert_eq!(Route::parse("/backtest/"), Some(Route::Backtest));
        assert_eq!(Route::parse("/result/42"), Some(Route::Result("42".to_string())));
        assert_eq!(Route::parse("/result/"), None);
        assert_eq!(Route::parse("/nowhere"), None);
    }

    #[test]
    fn test_path_round_trip() {
        for route in [Route::Login, Route::Verify, Route::Dashboard, Route::Backtest, Route::Result("r-9".into())] {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }

    #[test]
    fn test_guard_unauthenticated() {
        let store = SessionStore::new();
        assert_eq!(guard(Route::Dashboard, &store), Route::Login);
        assert_eq!(guard(Route::Result("1".into()), &store), Route::Login);
        assert_eq!(guard(Route::Login, &store), Route::Login);
        assert_eq!(guard(Route::Verify, &store), Route::Verify);
    }

    #[test]
    fn test_guard_authenticated() {
        let store = signed_in();
        assert_eq!(guard(Route::Backtest, &store), Route::Backtest);
        assert_eq!(guard(Route::Login, &store), Route::Dashboard);
    }

    #[test]
    fn test_guard_requires_tokens() {
        let store = signed_in();
        store.set_tokens(String::new(), String::new());
        assert_eq!(guard(Route::Dashboard, &store), Route::Login);
        assert_eq!(guard(Route::Login, &store), Route::Login);
    }

    #[test]
    fn test_history_navigator() {
        let nav = HistoryNavigator::new();
        assert_eq!(nav.current(), None);
        nav.navigate(Route::Dashboard);
        nav.navigate(Route::Login);
        assert_eq!(nav.current(), Some(Route::Login));
        assert_eq!(nav.history().len(), 2);
    }
}
