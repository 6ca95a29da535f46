use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::storage::{PersistedSession, SessionStorage};
use crate::models::User;

/// Complete session state, including transient UI feedback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    fn from_persisted(persisted: PersistedSession) -> Self {
        let is_authenticated = persisted.is_authenticated
            && tokens_present(persisted.token.as_deref(), persisted.refresh_token.as_deref());
        Self {
            user: persisted.user,
            access_token: persisted.token,
            refresh_token: persisted.refresh_token,
            is_authenticated,
            is_loading: false,
            error: None,
        }
    }

    pub fn persisted(&self) -> PersistedSession {
        PersistedSession {
            user: self.user.clone(),
            token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            is_authenticated: self.is_authenticated,
        }
    }

    /// True when the login flag is set and both tokens are non-empty
    pub fn has_credentials(&self) -> bool {
        self.is_authenticated
            && tokens_present(self.access_token.as_deref(), self.refresh_token.as_deref())
    }
}

fn tokens_present(access_token: Option<&str>, refresh_token: Option<&str>) -> bool {
    access_token.is_some_and(|t| !t.is_empty()) && refresh_token.is_some_and(|t| !t.is_empty())
}

/// What an action does to persisted storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    Skip,
    Save,
    Clear,
}

/// Shared handle to the application's session.
///
/// Clone is cheap; all clones observe the same state. Each action replaces the
/// whole state in one step, so readers never see a half-applied update.
#[derive(Clone, Debug)]
pub struct SessionStore {
    state: Arc<watch::Sender<SessionState>>,
    storage: Option<Arc<dyn SessionStorage>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Empty, non-persistent session
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self {
            state: Arc::new(tx),
            storage: None,
        }
    }

    /// Build a session from persisted storage.
    ///
    /// A missing or unreadable entry yields an empty session.
    pub fn hydrate(storage: Arc<dyn SessionStorage>) -> Self {
        let initial = match storage.load() {
            Ok(Some(persisted)) => {
                debug!(authenticated = persisted.is_authenticated, "Session hydrated from storage");
                SessionState::from_persisted(persisted)
            }
            Ok(None) => {
                debug!("No stored session found");
                SessionState::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load stored session, starting empty");
                SessionState::default()
            }
        };
        let (tx, _rx) = watch::channel(initial);
        Self {
            state: Arc::new(tx),
            storage: Some(storage),
        }
    }

    // ===== Reads =====

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Receiver that is notified after every action
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    // ===== Actions =====

    /// Replace the identity record. Tokens are untouched.
    pub fn set_user(&self, user: User) {
        self.update(Persist::Save, |s| s.user = Some(user));
    }

    /// Replace both tokens and mark the session authenticated.
    /// An empty token leaves the session unauthenticated.
    pub fn set_tokens(&self, access_token: String, refresh_token: String) {
        self.update(Persist::Save, |s| {
            s.is_authenticated = tokens_present(Some(access_token.as_str()), Some(refresh_token.as_str()));
            s.access_token = Some(access_token);
            s.refresh_token = Some(refresh_token);
        });
    }

    /// Record a completed interactive authentication.
    pub fn login(&self, user: User, access_token: String, refresh_token: String) {
        info!(user_id = %user.id, "Session started");
        self.update(Persist::Save, |s| {
            s.is_authenticated = tokens_present(Some(access_token.as_str()), Some(refresh_token.as_str()));
            s.user = Some(user);
            s.access_token = Some(access_token);
            s.refresh_token = Some(refresh_token);
            s.error = None;
        });
    }

    /// Clear identity, tokens and error, and drop the stored copy.
    /// Does not contact the backend.
    pub fn logout(&self) {
        info!("Session cleared");
        self.update(Persist::Clear, |s| {
            s.user = None;
            s.access_token = None;
            s.refresh_token = None;
            s.is_authenticated = false;
            s.error = None;
        });
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.update(Persist::Skip, |s| s.is_loading = is_loading);
    }

    /// Record an error message; also ends any loading state.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(Persist::Skip, |s| {
            s.error = Some(message);
            s.is_loading = false;
        });
    }

    pub fn clear_error(&self) {
        self.update(Persist::Skip, |s| s.error = None);
    }

    /// Apply one action. The storage write happens while the state is still
    /// locked, so writes land in the same order as the updates.
    fn update<F>(&self, persist: Persist, action: F)
    where
        F: FnOnce(&mut SessionState),
    {
        self.state.send_modify(|s| {
            action(s);
            let Some(ref storage) = self.storage else {
                return;
            };
            let result = match persist {
                Persist::Skip => Ok(()),
                Persist::Save => storage.save(&s.persisted()),
                Persist::Clear => storage.clear(),
            };
            if let Err(e) = result {
                warn!(error = %e, "Failed to persist session");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::{FileStorage, MemoryStorage};

    fn user() -> User {
        User {
            id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            avatar: None,
            is_pro: true,
            is_verified: true,
            last_login_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_new_session_is_empty() {
        let store = SessionStore::new();
        assert_eq!(store.snapshot(), SessionState::default());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_login_sets_identity_and_tokens() {
        let store = SessionStore::new();
        store.set_error("previous failure");
        store.login(user(), "access".to_string(), "refresh".to_string());

        let state = store.snapshot();
        assert!(state.is_authenticated);
        assert!(state.has_credentials());
        assert_eq!(state.user, Some(user()));
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_logout_clears_everything() {
        let store = SessionStore::new();
        store.login(user(), "access".to_string(), "refresh".to_string());
        store.set_error("boom");
        store.logout();

        let state = store.snapshot();
        assert!(state.user.is_none());
        assert!(state.access_token.is_none());
        assert!(state.refresh_token.is_none());
        assert!(!state.is_authenticated);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_set_user_keeps_tokens() {
        let store = SessionStore::new();
        store.set_tokens("access".to_string(), "refresh".to_string());
        store.set_user(user());
        assert_eq!(store.access_token().as_deref(), Some("access"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_set_error_stops_loading() {
        let store = SessionStore::new();
        store.set_loading(true);
        assert!(store.is_loading());
        store.set_error("Invalid credentials");
        assert!(!store.is_loading());
        assert_eq!(store.error().as_deref(), Some("Invalid credentials"));
        store.clear_error();
        assert!(store.error().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::new();
        let other = store.clone();
        store.set_tokens("a".to_string(), "r".to_string());
        assert_eq!(other.access_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_subscribers_see_whole_updates() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();
        store.login(user(), "access".to_string(), "refresh".to_string());

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.user, Some(user()));
        assert_eq!(seen.access_token.as_deref(), Some("access"));
        assert!(seen.is_authenticated);
    }

    #[test]
    fn test_persisted_round_trip_into_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn SessionStorage> = Arc::new(FileStorage::new(dir.path().to_path_buf()));

        let store = SessionStore::hydrate(storage.clone());
        store.login(user(), "access".to_string(), "refresh".to_string());
        store.set_loading(true);
        store.set_error("transient");

        let reloaded = SessionStore::hydrate(storage).snapshot();
        assert_eq!(reloaded.user, Some(user()));
        assert_eq!(reloaded.access_token.as_deref(), Some("access"));
        assert_eq!(reloaded.refresh_token.as_deref(), Some("refresh"));
        assert!(reloaded.is_authenticated);
        assert!(!reloaded.is_loading);
        assert!(reloaded.error.is_none());
    }

    #[test]
    fn test_logout_clears_storage() {
        let storage = MemoryStorage::new();
        let store = SessionStore::hydrate(Arc::new(storage.clone()));
        store.login(user(), "access".to_string(), "refresh".to_string());
        assert!(storage.load().unwrap().is_some());

        store.logout();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_logout_removes_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());
        let store = SessionStore::hydrate(Arc::new(storage.clone()));
        store.login(user(), "access".to_string(), "refresh".to_string());
        assert!(storage.path().exists());

        store.logout();
        assert!(!storage.path().exists());
        assert_eq!(SessionStore::hydrate(Arc::new(storage)).snapshot(), SessionState::default());
    }

    #[test]
    fn test_login_with_empty_tokens_is_not_authenticated() {
        let store = SessionStore::new();
        store.login(user(), String::new(), String::new());
        assert!(!store.is_authenticated());
        assert!(!store.snapshot().has_credentials());

        store.login(user(), "access".to_string(), String::new());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_set_tokens_with_empty_refresh_token_is_not_authenticated() {
        let store = SessionStore::new();
        store.login(user(), "access".to_string(), "refresh".to_string());
        store.set_tokens("new".to_string(), String::new());
        assert!(!store.is_authenticated());
        assert_eq!(store.access_token().as_deref(), Some("new"));
    }

    #[test]
    fn test_hydrate_ignores_flag_without_tokens() {
        let storage = MemoryStorage::new();
        storage
            .save(&PersistedSession {
                user: Some(user()),
                token: None,
                refresh_token: None,
                is_authenticated: true,
            })
            .unwrap();

        let store = SessionStore::hydrate(Arc::new(storage));
        assert!(!store.is_authenticated());
        assert_eq!(store.user(), Some(user()));
    }

    #[test]
    fn test_concurrent_actions_persist_final_state() {
        let storage = MemoryStorage::new();
        let store = SessionStore::hydrate(Arc::new(storage.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for n in 0..200 {
                        store.set_tokens(format!("a-{i}-{n}"), format!("r-{i}-{n}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored = storage.load().unwrap().unwrap();
        assert_eq!(stored, store.snapshot().persisted());
    }

    #[test]
    fn test_unreadable_storage_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());
        std::fs::write(storage.path(), "garbage").unwrap();

        let store = SessionStore::hydrate(Arc::new(storage));
        assert_eq!(store.snapshot(), SessionState::default());
    }
}
