//! Navigation guard for the admin area. The decision itself is pure;
//! `check` adds the lazy store initialization the first navigation needs.

use crate::{Phase, SessionStore};

pub const ADMIN_HOME: &str = "/admin";
pub const LOGIN_PATH: &str = "/admin/login";

/// Admin paths reachable without a session.
const PUBLIC_ADMIN_PATHS: [&str; 4] = [
    "/admin/login",
    "/admin/register",
    "/admin/forgot-password",
    "/admin/reset-password",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Proceed,
    Redirect(&'static str),
}

/// Pure routing rule over the target path and the authentication state.
pub fn decide(path: &str, authenticated: bool) -> RouteDecision {
    if !path.starts_with(ADMIN_HOME) {
        return RouteDecision::Proceed;
    }

    if PUBLIC_ADMIN_PATHS.contains(&path) {
        // No reason to show login/register to a signed-in user
        if authenticated {
            RouteDecision::Redirect(ADMIN_HOME)
        } else {
            RouteDecision::Proceed
        }
    } else if authenticated {
        RouteDecision::Proceed
    } else {
        RouteDecision::Redirect(LOGIN_PATH)
    }
}

/// Decide a navigation, initializing the store first if this is the
/// first navigation. The await blocks the navigation until the session
/// check resolves — the decision never races ahead of a stale state.
pub async fn check(store: &SessionStore, path: &str) -> RouteDecision {
    if store.phase() == Phase::Uninitialized && !store.is_loading() {
        // Init failure leaves the store in the error phase; the
        // navigation then proceeds as unauthenticated.
        let _ = store.init().await;
    }

    decide(path, store.is_authenticated())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wanxuanju_auth::{AuthBackend, AuthConfig};
    use wanxuanju_db::Database;

    #[test]
    fn public_pages_always_proceed() {
        assert_eq!(decide("/about", false), RouteDecision::Proceed);
        assert_eq!(decide("/about", true), RouteDecision::Proceed);
        assert_eq!(decide("/", false), RouteDecision::Proceed);
        assert_eq!(decide("/history", true), RouteDecision::Proceed);
    }

    #[test]
    fn login_redirects_home_when_authenticated() {
        assert_eq!(
            decide("/admin/login", true),
            RouteDecision::Redirect(ADMIN_HOME)
        );
        assert_eq!(decide("/admin/login", false), RouteDecision::Proceed);
        assert_eq!(decide("/admin/register", false), RouteDecision::Proceed);
        assert_eq!(
            decide("/admin/forgot-password", true),
            RouteDecision::Redirect(ADMIN_HOME)
        );
    }

    #[test]
    fn protected_pages_require_authentication() {
        assert_eq!(
            decide("/admin/reports", false),
            RouteDecision::Redirect(LOGIN_PATH)
        );
        assert_eq!(decide("/admin/reports", true), RouteDecision::Proceed);
        assert_eq!(decide("/admin", false), RouteDecision::Redirect(LOGIN_PATH));
        assert_eq!(decide("/admin", true), RouteDecision::Proceed);
    }

    #[tokio::test]
    async fn check_initializes_an_untouched_store() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = AuthBackend::new(db.clone(), AuthConfig::default());

        // A session already exists at the backend before the store's
        // first navigation.
        auth.sign_up(
            "admin@example.com",
            "correct-horse",
            serde_json::json!({}),
            "http://localhost/admin",
        )
        .await
        .unwrap();

        let store = SessionStore::new(auth, db, "http://localhost:5173");
        assert_eq!(store.phase(), Phase::Uninitialized);

        let decision = check(&store, "/admin/announcements").await;
        assert_eq!(decision, RouteDecision::Proceed);
        assert_eq!(store.phase(), Phase::Authenticated);

        // Re-visiting the login page while signed in bounces to admin home
        assert_eq!(
            check(&store, "/admin/login").await,
            RouteDecision::Redirect(ADMIN_HOME)
        );
    }
}
