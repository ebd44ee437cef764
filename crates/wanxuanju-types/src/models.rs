use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application role stored in `user_meta_info`. Closed set — any other
/// value in the database is treated as corrupt, not coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parse the exact database representation. Case-sensitive.
    pub fn from_db(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// An authenticated principal as the auth backend reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    /// Provider-supplied metadata, arbitrary JSON.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// The part of the email before the `@`, used as a display-name fallback.
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// A live session: bearer token plus the identity it was minted for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Application profile, one-to-one with an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMeta {
    pub user_id: Uuid,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A file attached to an announcement: one stored object plus this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub announcement_id: Uuid,
    pub file_name: String,
    pub storage_path: String,
    pub file_url: String,
    pub file_size: i64,
    pub file_type: String,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip_is_case_sensitive() {
        assert_eq!(Role::from_db("admin"), Some(Role::Admin));
        assert_eq!(Role::from_db("user"), Some(Role::User));
        assert_eq!(Role::from_db("Admin"), None);
        assert_eq!(Role::from_db("ADMIN"), None);
        assert_eq!(Role::from_db("editor"), None);
    }

    #[test]
    fn email_local_part() {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: "a@b.com".into(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        };
        assert_eq!(identity.email_local_part(), "a");
    }
}
