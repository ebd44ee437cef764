/// Database row types — these map directly to SQLite rows.
/// Distinct from the wanxuanju-types API models to keep the DB layer
/// independent; conversion happens through the `into_*` methods below.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use wanxuanju_types::models::{Announcement, Attachment, Identity, Role, UserMeta};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub provider_meta: String,
    pub email_confirmed: bool,
    pub created_at: String,
}

impl UserRow {
    /// The auth-facing view of this row. The password hash and the
    /// confirmation flag never leave the backend.
    pub fn into_identity(self) -> Result<Identity> {
        Ok(Identity {
            id: parse_uuid(&self.id)?,
            metadata: serde_json::from_str(&self.provider_meta)
                .with_context(|| format!("bad provider metadata for user {}", self.id))?,
            email: self.email,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct UserMetaRow {
    pub user_id: String,
    pub full_name: String,
    pub role: String,
}

impl UserMetaRow {
    pub fn into_user_meta(self) -> Result<UserMeta> {
        let role = Role::from_db(&self.role)
            .with_context(|| format!("invalid role value: {}", self.role))?;
        Ok(UserMeta {
            user_id: parse_uuid(&self.user_id)?,
            full_name: self.full_name,
            role,
        })
    }
}

pub struct AnnouncementRow {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
}

impl AnnouncementRow {
    pub fn into_announcement(self) -> Result<Announcement> {
        Ok(Announcement {
            id: parse_uuid(&self.id)?,
            title: self.title,
            body: self.body,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct AttachmentRow {
    pub id: String,
    pub announcement_id: String,
    pub file_name: String,
    pub storage_path: String,
    pub file_url: String,
    pub file_size: i64,
    pub file_type: String,
    pub display_order: i32,
    pub created_at: String,
}

impl AttachmentRow {
    pub fn into_attachment(self) -> Result<Attachment> {
        Ok(Attachment {
            id: parse_uuid(&self.id)?,
            announcement_id: parse_uuid(&self.announcement_id)?,
            file_name: self.file_name,
            storage_path: self.storage_path,
            file_url: self.file_url,
            file_size: self.file_size,
            file_type: self.file_type,
            display_order: self.display_order,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("invalid UUID in row: {}", s))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp in row: {}", s))
}
