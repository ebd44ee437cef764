use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Announcement, Attachment, Identity, Session};

// -- JWT Claims --

/// JWT claims shared by the auth backend (minting) and the server
/// middleware (validation). Canonical definition lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub email: String,
}

/// Outcome of a registration. With the email-confirmation gate on, the
/// account exists but no session is usable until the link is followed.
#[derive(Debug, Clone, Serialize)]
pub struct SignUpOutcome {
    pub identity: Identity,
    pub session: Option<Session>,
    pub needs_email_confirmation: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Option<Session>,
}

// -- Announcements --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementDetail {
    pub announcement: Announcement,
    pub attachments: Vec<Attachment>,
}

// -- Errors --

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
