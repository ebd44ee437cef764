//! Session store for the admin SPA: authentication state, the cached
//! user-metadata projection, and the actions the UI drives.
//!
//! State lives in one synchronized cell; actions and the session-change
//! listener all funnel through `write`, so readers always observe a
//! complete last write. The loading flag is cleared by a drop guard, so
//! no early return can leave it stuck.

pub mod guard;

use std::fmt::Display;
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use wanxuanju_auth::AuthBackend;
use wanxuanju_db::Database;
use wanxuanju_types::api::SignUpOutcome;
use wanxuanju_types::events::SessionChange;
use wanxuanju_types::models::{Identity, Role, Session, UserMeta};

/// Display name used when nothing better is known.
pub const FALLBACK_DISPLAY_NAME: &str = "訪客";

const RESET_PASSWORD_PATH: &str = "/admin/reset-password";

/// Lifecycle phase of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Loading,
    Authenticated,
    Anonymous,
    Error,
}

/// A complete copy of the store's state at one instant.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub phase: Phase,
    pub identity: Option<Identity>,
    pub session: Option<Session>,
    pub meta: Option<UserMeta>,
    pub loading: bool,
    pub error: Option<String>,
}

/// A failed store action, carrying the backend's message. The same
/// message is recorded in the store's error field.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    auth: AuthBackend,
    db: Arc<Database>,
    /// SPA origin, used to build redirect links in sign-up and reset mails.
    origin: String,
    state: RwLock<SessionState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(auth: AuthBackend, db: Arc<Database>, origin: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                auth,
                db,
                origin: origin.into(),
                state: RwLock::new(SessionState::default()),
                listener: Mutex::new(None),
            }),
        }
    }

    // -- Actions --

    /// Check the backend for an existing session and start the standing
    /// session-change listener. Safe to call again; the listener is only
    /// registered once.
    pub async fn init(&self) -> Result<(), ActionError> {
        let _guard = self.begin_action();
        self.write(|s| s.phase = Phase::Loading);

        let result = match self.inner.auth.current_session().await {
            Ok(Some(session)) => {
                let meta = self.reconcile_metadata(&session.identity).await;
                self.write(|s| {
                    s.identity = Some(session.identity.clone());
                    s.session = Some(session);
                    s.meta = meta;
                    s.phase = Phase::Authenticated;
                });
                Ok(())
            }
            Ok(None) => {
                self.write(|s| s.phase = Phase::Anonymous);
                Ok(())
            }
            Err(e) => {
                let error = self.record_error(e);
                self.write(|s| s.phase = Phase::Error);
                Err(error)
            }
        };

        self.spawn_listener();
        result
    }

    /// Ensure the application profile for an identity exists and return
    /// the cached copy. A missing record is created with role `user` and
    /// a derived display name. Failure is non-fatal: the caller stays
    /// authenticated with no cached metadata.
    pub async fn reconcile_metadata(&self, identity: &Identity) -> Option<UserMeta> {
        match self.lookup_or_create_meta(identity) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Metadata reconciliation failed for {}: {}", identity.id, e);
                None
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ActionError> {
        let _guard = self.begin_action();

        match self.inner.auth.sign_in_with_password(email, password).await {
            Ok(session) => {
                let identity = session.identity.clone();
                let meta = self.reconcile_metadata(&identity).await;
                self.write(|s| {
                    s.identity = Some(identity.clone());
                    s.session = Some(session);
                    s.meta = meta;
                    s.phase = Phase::Authenticated;
                });
                Ok(identity)
            }
            Err(e) => Err(self.record_error(e)),
        }
    }

    pub async fn sign_out(&self) -> Result<(), ActionError> {
        let _guard = self.begin_action();

        match self.inner.auth.sign_out().await {
            Ok(()) => {
                self.write(|s| {
                    s.identity = None;
                    s.session = None;
                    s.meta = None;
                    s.phase = Phase::Anonymous;
                });
                Ok(())
            }
            Err(e) => Err(self.record_error(e)),
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, ActionError> {
        let _guard = self.begin_action();
        let redirect = format!("{}{}", self.inner.origin, guard::ADMIN_HOME);

        match self.inner.auth.sign_up(email, password, metadata, &redirect).await {
            Ok(outcome) => {
                if let Some(session) = outcome.session.clone() {
                    let meta = self.reconcile_metadata(&session.identity).await;
                    self.write(|s| {
                        s.identity = Some(session.identity.clone());
                        s.session = Some(session);
                        s.meta = meta;
                        s.phase = Phase::Authenticated;
                    });
                }
                Ok(outcome)
            }
            Err(e) => Err(self.record_error(e)),
        }
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), ActionError> {
        let _guard = self.begin_action();
        let redirect = format!("{}{}", self.inner.origin, RESET_PASSWORD_PATH);

        self.inner
            .auth
            .reset_password_for_email(email, &redirect)
            .await
            .map_err(|e| self.record_error(e))
    }

    /// Tear down the session-change listener. Also runs on drop of the
    /// last store handle.
    pub fn close(&self) {
        if let Some(handle) = self.lock_listener().take() {
            handle.abort();
        }
    }

    // -- Derived getters --

    pub fn state(&self) -> SessionState {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.read().unwrap_or_else(|e| e.into_inner()).phase
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().unwrap_or_else(|e| e.into_inner()).loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .identity
            .is_some()
    }

    /// True only when a metadata record is cached and its role is
    /// exactly `admin`.
    pub fn is_admin(&self) -> bool {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .meta
            .as_ref()
            .is_some_and(|meta| meta.role == Role::Admin)
    }

    /// Cached full name, then provider-supplied name, then the email
    /// local part, then the fallback placeholder.
    pub fn display_name(&self) -> String {
        let state = self.inner.state.read().unwrap_or_else(|e| e.into_inner());

        if let Some(meta) = &state.meta {
            return meta.full_name.clone();
        }
        if let Some(identity) = &state.identity {
            if let Some(name) = provider_name(identity) {
                return name;
            }
            return identity.email_local_part().to_string();
        }
        FALLBACK_DISPLAY_NAME.to_string()
    }

    // -- Internals --

    fn lookup_or_create_meta(&self, identity: &Identity) -> anyhow::Result<UserMeta> {
        let key = identity.id.to_string();

        if let Some(row) = self.inner.db.get_user_meta(&key)? {
            return row.into_user_meta();
        }

        let full_name =
            provider_name(identity).unwrap_or_else(|| identity.email_local_part().to_string());
        self.inner
            .db
            .insert_user_meta(&key, &full_name, Role::User.as_str())?;

        Ok(UserMeta {
            user_id: identity.id,
            full_name,
            role: Role::User,
        })
    }

    /// Single serialized write path for all state mutation.
    fn write<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Raise the loading flag and clear any stale error; the returned
    /// guard lowers the flag when the action ends, however it ends.
    fn begin_action(&self) -> LoadingGuard<'_> {
        self.write(|s| {
            s.loading = true;
            s.error = None;
        });
        LoadingGuard { store: self }
    }

    fn record_error(&self, e: impl Display) -> ActionError {
        let message = e.to_string();
        self.write(|s| s.error = Some(message.clone()));
        ActionError { message }
    }

    /// Spawn the standing session-change listener, once. Every pushed
    /// event re-runs reconciliation and replaces the cached fields.
    fn spawn_listener(&self) {
        let mut slot = self.lock_listener();
        if slot.is_some() {
            return;
        }

        // The task holds only a weak handle, so dropping the last store
        // handle still tears the listener down.
        let weak = Arc::downgrade(&self.inner);
        let mut changes = self.inner.auth.subscribe();
        *slot = Some(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(inner) = weak.upgrade() else { break };
                        SessionStore { inner }.apply_change(change).await;
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Session listener lagged by {} events", n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    async fn apply_change(&self, change: SessionChange) {
        match change.session().cloned() {
            Some(session) => {
                let meta = self.reconcile_metadata(&session.identity).await;
                self.write(|s| {
                    s.identity = Some(session.identity.clone());
                    s.session = Some(session);
                    s.meta = meta;
                    s.phase = Phase::Authenticated;
                });
            }
            None => self.write(|s| {
                s.identity = None;
                s.session = None;
                s.meta = None;
                s.phase = Phase::Anonymous;
            }),
        }
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.listener.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

/// Clears the loading flag when an action ends, including early returns.
struct LoadingGuard<'a> {
    store: &'a SessionStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.write(|s| s.loading = false);
    }
}

fn provider_name(identity: &Identity) -> Option<String> {
    for key in ["full_name", "name"] {
        if let Some(name) = identity.metadata.get(key).and_then(|v| v.as_str()) {
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use uuid::Uuid;
    use wanxuanju_auth::AuthConfig;

    const ORIGIN: &str = "http://localhost:5173";

    fn store() -> SessionStore {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = AuthBackend::new(db.clone(), AuthConfig::default());
        SessionStore::new(auth, db, ORIGIN)
    }

    fn bare_identity(email: &str, metadata: serde_json::Value) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: email.into(),
            metadata,
            created_at: Utc::now(),
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn init_without_session_is_anonymous() {
        let store = store();
        store.init().await.unwrap();

        let state = store.state();
        assert_eq!(state.phase, Phase::Anonymous);
        assert!(!state.loading);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn sign_up_authenticates_and_creates_metadata() {
        let store = store();
        store.init().await.unwrap();

        let outcome = store
            .sign_up(
                "alice@example.com",
                "correct-horse",
                serde_json::json!({"full_name": "Alice Chen"}),
            )
            .await
            .unwrap();
        assert!(!outcome.needs_email_confirmation);

        assert_eq!(store.phase(), Phase::Authenticated);
        assert!(store.is_authenticated());
        assert!(!store.is_admin());
        assert_eq!(store.display_name(), "Alice Chen");

        let meta = store.state().meta.unwrap();
        assert_eq!(meta.role, Role::User);
    }

    #[tokio::test]
    async fn sign_in_failure_leaves_cached_state_untouched() {
        let store = store();
        store
            .sign_up("alice@example.com", "correct-horse", serde_json::json!({}))
            .await
            .unwrap();
        let cached = store.state().identity.unwrap();

        let err = store
            .sign_in("alice@example.com", "wrong-password")
            .await
            .unwrap_err();

        let state = store.state();
        assert_eq!(state.identity.unwrap().id, cached.id);
        assert!(state.session.is_some());
        assert_eq!(state.error.as_deref(), Some(err.message.as_str()));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn sign_out_clears_everything() {
        let store = store();
        store
            .sign_up("alice@example.com", "correct-horse", serde_json::json!({}))
            .await
            .unwrap();

        store.sign_out().await.unwrap();

        let state = store.state();
        assert_eq!(state.phase, Phase::Anonymous);
        assert!(state.identity.is_none());
        assert!(state.session.is_none());
        assert!(state.meta.is_none());
    }

    #[tokio::test]
    async fn reconcile_twice_creates_exactly_one_record() {
        let store = store();
        let outcome = store
            .sign_up(
                "bob@example.com",
                "correct-horse",
                serde_json::json!({"full_name": "Bob"}),
            )
            .await
            .unwrap();
        let identity = outcome.identity;

        let first = store.reconcile_metadata(&identity).await.unwrap();

        // Same identity, different provider name now — the existing record
        // wins, nothing is duplicated.
        let mut changed = identity.clone();
        changed.metadata = serde_json::json!({"full_name": "Robert"});
        let second = store.reconcile_metadata(&changed).await.unwrap();

        assert_eq!(first.full_name, second.full_name);
    }

    #[tokio::test]
    async fn reconcile_failure_is_non_fatal() {
        let store = store();
        // An identity with no backing user row: the insert violates the
        // foreign key, so reconciliation yields no cached record.
        let stray = bare_identity("stray@example.com", serde_json::json!({}));
        assert!(store.reconcile_metadata(&stray).await.is_none());
    }

    #[tokio::test]
    async fn is_admin_requires_exact_admin_role() {
        let store = store();
        let outcome = store
            .sign_up("carol@example.com", "correct-horse", serde_json::json!({}))
            .await
            .unwrap();

        // No cached record at all
        store.write(|s| s.meta = None);
        assert!(!store.is_admin());

        store.write(|s| {
            s.meta = Some(UserMeta {
                user_id: outcome.identity.id,
                full_name: "Carol".into(),
                role: Role::User,
            })
        });
        assert!(!store.is_admin());

        store.write(|s| {
            if let Some(meta) = &mut s.meta {
                meta.role = Role::Admin;
            }
        });
        assert!(store.is_admin());
    }

    #[tokio::test]
    async fn display_name_resolution_order() {
        let store = store();

        // Nothing at all
        assert_eq!(store.display_name(), FALLBACK_DISPLAY_NAME);

        // Identity with empty metadata and no cached record: email local part
        store.write(|s| {
            s.identity = Some(bare_identity("a@b.com", serde_json::json!({})));
            s.meta = None;
        });
        assert_eq!(store.display_name(), "a");

        // Provider name beats the local part
        store.write(|s| {
            s.identity = Some(bare_identity(
                "a@b.com",
                serde_json::json!({"name": "提供者"}),
            ));
        });
        assert_eq!(store.display_name(), "提供者");

        // Cached record beats both
        store.write(|s| {
            s.meta = Some(UserMeta {
                user_id: Uuid::new_v4(),
                full_name: "記錄名".into(),
                role: Role::User,
            })
        });
        assert_eq!(store.display_name(), "記錄名");
    }

    #[tokio::test]
    async fn pushed_session_events_update_the_store() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = AuthBackend::new(db.clone(), AuthConfig::default());
        let store = SessionStore::new(auth.clone(), db, ORIGIN);

        store.init().await.unwrap();
        assert_eq!(store.phase(), Phase::Anonymous);

        // Sign in directly against the backend — only the pushed event can
        // tell the store about it.
        auth.sign_up(
            "dave@example.com",
            "correct-horse",
            serde_json::json!({}),
            "http://localhost/admin",
        )
        .await
        .unwrap();

        let probe = store.clone();
        wait_until(move || probe.is_authenticated()).await;
        assert_eq!(store.phase(), Phase::Authenticated);

        auth.sign_out().await.unwrap();
        let probe = store.clone();
        wait_until(move || !probe.is_authenticated()).await;
        assert_eq!(store.phase(), Phase::Anonymous);

        store.close();
    }
}
