use serde::{Deserialize, Serialize};

use crate::models::Session;

/// Session lifecycle events pushed by the auth backend to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionChange {
    /// A session became active (sign-in or confirmed sign-up).
    SignedIn { session: Session },

    /// The current session ended (sign-out or expiry).
    SignedOut,
}

impl SessionChange {
    /// The session now in effect, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionChange::SignedIn { session } => Some(session),
            SessionChange::SignedOut => None,
        }
    }
}
