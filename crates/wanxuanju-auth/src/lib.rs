//! Local auth backend: password accounts, JWT sessions, and a
//! session-change broadcast that consumers subscribe to.
//!
//! Stands in for the managed auth service. Confirmation and reset links
//! are logged instead of mailed; everything else behaves like the real
//! thing, including the no-enumeration reset and the confirmation gate.

pub mod password;
pub mod token;

use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use wanxuanju_db::Database;
use wanxuanju_types::api::SignUpOutcome;
use wanxuanju_types::events::SessionChange;
use wanxuanju_types::models::{Identity, Session};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email is already registered")]
    EmailTaken,

    #[error("email address not confirmed")]
    EmailNotConfirmed,

    #[error("{0}")]
    Invalid(String),

    #[error("auth backend failure: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Backend(e.to_string())
    }
}

pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub require_email_confirmation: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".into(),
            session_ttl: Duration::hours(24),
            require_email_confirmation: false,
        }
    }
}

/// The auth service handle. Cheap to clone; all clones share the current
/// session and the change channel.
#[derive(Clone)]
pub struct AuthBackend {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    db: Arc<Database>,
    config: AuthConfig,
    current: RwLock<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
}

impl AuthBackend {
    pub fn new(db: Arc<Database>, config: AuthConfig) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(AuthInner {
                db,
                config,
                current: RwLock::new(None),
                changes,
            }),
        }
    }

    /// Subscribe to session-change events. Receivers see every sign-in,
    /// sign-out, and detected expiry for the life of the backend.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.inner.changes.subscribe()
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner.config.jwt_secret
    }

    /// The session currently in effect, if it has not expired. An expired
    /// session is dropped and announced as a sign-out.
    pub async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        match self.read_current() {
            Some(session) if session.is_expired(Utc::now()) => {
                warn!("Current session expired, signing out");
                self.set_current(None);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let user = self
            .inner
            .db
            .get_user_by_email(email)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !password::verify(&user.password, password) {
            return Err(AuthError::InvalidCredentials);
        }
        if self.inner.config.require_email_confirmation && !user.email_confirmed {
            return Err(AuthError::EmailNotConfirmed);
        }

        let identity = user.into_identity()?;
        let session = token::mint(
            &self.inner.config.jwt_secret,
            &identity,
            self.inner.config.session_ttl,
        )?;

        info!("User {} signed in", identity.id);
        self.set_current(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.set_current(None);
        Ok(())
    }

    /// Register an account. With the confirmation gate on, the account is
    /// created unconfirmed and no session is returned until the logged
    /// confirmation link is followed.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        if !email.contains('@') {
            return Err(AuthError::Invalid("invalid email address".into()));
        }
        if password.len() < 8 {
            return Err(AuthError::Invalid(
                "password must be at least 8 characters".into(),
            ));
        }
        if self.inner.db.get_user_by_email(email)?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let confirmed = !self.inner.config.require_email_confirmation;

        self.inner.db.create_user(
            &id.to_string(),
            email,
            &password::hash(password)?,
            &metadata.to_string(),
            confirmed,
            &created_at.to_rfc3339(),
        )?;

        let identity = Identity {
            id,
            email: email.to_string(),
            metadata,
            created_at,
        };

        if !confirmed {
            info!(
                "User {} registered; confirmation link: {}?confirm={}",
                id, redirect_to, id
            );
            return Ok(SignUpOutcome {
                identity,
                session: None,
                needs_email_confirmation: true,
            });
        }

        let session = token::mint(
            &self.inner.config.jwt_secret,
            &identity,
            self.inner.config.session_ttl,
        )?;
        info!("User {} registered and signed in", id);
        self.set_current(Some(session.clone()));

        Ok(SignUpOutcome {
            identity,
            session: Some(session),
            needs_email_confirmation: false,
        })
    }

    /// Complete the confirmation step for a registered account.
    pub async fn confirm_email(&self, user_id: Uuid) -> Result<(), AuthError> {
        let user = self
            .inner
            .db
            .get_user_by_id(&user_id.to_string())?
            .ok_or_else(|| AuthError::Backend(format!("no such user: {user_id}")))?;
        self.inner.db.mark_email_confirmed(&user.id)?;
        info!("Email confirmed for user {}", user_id);
        Ok(())
    }

    /// Trigger an out-of-band password reset. Succeeds whether or not the
    /// address is registered — callers learn nothing about account
    /// existence.
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        match self.inner.db.get_user_by_email(email)? {
            Some(user) => info!(
                "Password reset link for {}: {}?reset={}",
                email, redirect_to, user.id
            ),
            None => info!("Password reset requested for unknown address {}", email),
        }
        Ok(())
    }

    fn read_current(&self) -> Option<Session> {
        self.inner
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Single write path for the current session; every transition is
    /// broadcast to subscribers.
    fn set_current(&self, session: Option<Session>) {
        let event = match &session {
            Some(s) => SessionChange::SignedIn { session: s.clone() },
            None => SessionChange::SignedOut,
        };
        *self
            .inner
            .current
            .write()
            .unwrap_or_else(|e| e.into_inner()) = session;
        let _ = self.inner.changes.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(config: AuthConfig) -> AuthBackend {
        let db = Arc::new(Database::open_in_memory().unwrap());
        AuthBackend::new(db, config)
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let auth = backend(AuthConfig::default());

        let outcome = auth
            .sign_up(
                "alice@example.com",
                "correct-horse",
                serde_json::json!({"full_name": "Alice"}),
                "http://localhost/admin",
            )
            .await
            .unwrap();
        assert!(!outcome.needs_email_confirmation);
        assert!(outcome.session.is_some());

        auth.sign_out().await.unwrap();
        assert!(auth.current_session().await.unwrap().is_none());

        let session = auth
            .sign_in_with_password("alice@example.com", "correct-horse")
            .await
            .unwrap();
        assert_eq!(session.identity.email, "alice@example.com");
        assert!(auth.current_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let auth = backend(AuthConfig::default());
        auth.sign_up(
            "bob@example.com",
            "correct-horse",
            serde_json::json!({}),
            "http://localhost/admin",
        )
        .await
        .unwrap();

        let err = auth
            .sign_in_with_password("bob@example.com", "battery-staple")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = auth
            .sign_in_with_password("nobody@example.com", "whatever-long")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let auth = backend(AuthConfig::default());
        auth.sign_up(
            "carol@example.com",
            "correct-horse",
            serde_json::json!({}),
            "http://localhost/admin",
        )
        .await
        .unwrap();

        let err = auth
            .sign_up(
                "carol@example.com",
                "other-password",
                serde_json::json!({}),
                "http://localhost/admin",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn confirmation_gate_blocks_sign_in_until_confirmed() {
        let auth = backend(AuthConfig {
            require_email_confirmation: true,
            ..AuthConfig::default()
        });

        let outcome = auth
            .sign_up(
                "dave@example.com",
                "correct-horse",
                serde_json::json!({}),
                "http://localhost/admin",
            )
            .await
            .unwrap();
        assert!(outcome.needs_email_confirmation);
        assert!(outcome.session.is_none());

        let err = auth
            .sign_in_with_password("dave@example.com", "correct-horse")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailNotConfirmed));

        auth.confirm_email(outcome.identity.id).await.unwrap();
        auth.sign_in_with_password("dave@example.com", "correct-horse")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn session_changes_are_broadcast() {
        let auth = backend(AuthConfig::default());
        let mut changes = auth.subscribe();

        auth.sign_up(
            "erin@example.com",
            "correct-horse",
            serde_json::json!({}),
            "http://localhost/admin",
        )
        .await
        .unwrap();
        auth.sign_out().await.unwrap();

        assert!(matches!(
            changes.recv().await.unwrap(),
            SessionChange::SignedIn { .. }
        ));
        assert!(matches!(
            changes.recv().await.unwrap(),
            SessionChange::SignedOut
        ));
    }

    #[tokio::test]
    async fn expired_session_is_dropped() {
        let auth = backend(AuthConfig {
            session_ttl: Duration::seconds(-1),
            ..AuthConfig::default()
        });
        auth.sign_up(
            "frank@example.com",
            "correct-horse",
            serde_json::json!({}),
            "http://localhost/admin",
        )
        .await
        .unwrap();

        assert!(auth.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_never_reveals_account_existence() {
        let auth = backend(AuthConfig::default());
        auth.reset_password_for_email("ghost@example.com", "http://localhost/admin/reset-password")
            .await
            .unwrap();
    }
}
