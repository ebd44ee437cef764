//! Attachment lifecycle for announcements: every attachment is one
//! stored object plus one database record, and the two are created and
//! deleted together on the failure paths that matter.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures_util::future;
use rand::{Rng, distr::Alphanumeric};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use wanxuanju_db::Database;
use wanxuanju_storage::{Bucket, UploadOptions};
use wanxuanju_types::models::Attachment;

/// Default lifetime for signed access URLs, in seconds.
pub const DEFAULT_SIGNED_URL_TTL: u64 = 3600;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("file upload failed: {0}")]
    Upload(String),

    #[error("database persistence failed: {0}")]
    Persistence(String),

    #[error("access URL generation failed: {0}")]
    Access(String),
}

/// What to do with already-uploaded siblings when one upload in a batch
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkUploadPolicy {
    /// Keep attachments that made it; report the first failure.
    KeepSuccesses,
    /// Best-effort delete of every sibling that made it, then report the
    /// first failure.
    RollbackOnFailure,
}

/// An incoming file: original name, declared MIME type, raw bytes.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Clone)]
pub struct AttachmentStore {
    db: Arc<Database>,
    bucket: Arc<Bucket>,
}

impl AttachmentStore {
    pub fn new(db: Arc<Database>, bucket: Arc<Bucket>) -> Self {
        Self { db, bucket }
    }

    /// Store one file and its record. The object is written first; if the
    /// record insert then fails, the object is deleted again before the
    /// error surfaces, so a failed upload leaves nothing behind.
    pub async fn upload(
        &self,
        announcement_id: Uuid,
        file: &UploadFile,
        display_order: i32,
    ) -> Result<Attachment, AttachmentError> {
        let storage_path = storage_path_for(announcement_id, &file.name);
        let options = UploadOptions {
            content_type: &file.content_type,
            cache_control: "3600",
            upsert: false,
        };

        self.bucket
            .upload(&storage_path, &file.bytes, &options)
            .await
            .map_err(|e| AttachmentError::Upload(e.to_string()))?;

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let file_url = self.bucket.public_url(&storage_path);

        let inserted = self.db.insert_attachment(
            &id.to_string(),
            &announcement_id.to_string(),
            &file.name,
            &storage_path,
            &file_url,
            file.bytes.len() as i64,
            &file.content_type,
            display_order,
            &created_at.to_rfc3339(),
        );

        if let Err(e) = inserted {
            // compensating delete: the object must not outlive the record
            if let Err(cleanup) = self.bucket.remove(std::slice::from_ref(&storage_path)).await {
                warn!(
                    "Object {} left behind after failed insert: {}",
                    storage_path, cleanup
                );
            }
            return Err(AttachmentError::Persistence(e.to_string()));
        }

        Ok(Attachment {
            id,
            announcement_id,
            file_name: file.name.clone(),
            storage_path,
            file_url,
            file_size: file.bytes.len() as i64,
            file_type: file.content_type.clone(),
            display_order,
            created_at,
        })
    }

    /// Upload a batch concurrently, index as display order. Every upload
    /// runs to completion before the batch reports; on failure the first
    /// error wins and `policy` decides what happens to the successes.
    pub async fn upload_many(
        &self,
        announcement_id: Uuid,
        files: &[UploadFile],
        policy: BulkUploadPolicy,
    ) -> Result<Vec<Attachment>, AttachmentError> {
        let uploads = files
            .iter()
            .enumerate()
            .map(|(index, file)| self.upload(announcement_id, file, index as i32));

        let mut attachments = Vec::with_capacity(files.len());
        let mut first_error = None;
        for result in future::join_all(uploads).await {
            match result {
                Ok(attachment) => attachments.push(attachment),
                Err(e) => {
                    let _ = first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(attachments),
            Some(error) => {
                if policy == BulkUploadPolicy::RollbackOnFailure {
                    for attachment in &attachments {
                        if let Err(e) = self.delete(attachment.id, &attachment.storage_path).await
                        {
                            warn!("Rollback of attachment {} failed: {}", attachment.id, e);
                        }
                    }
                }
                Err(error)
            }
        }
    }

    /// Delete record first, then object. A failed record delete aborts
    /// with nothing removed; a failed object delete after the record is
    /// gone is logged and the delete still counts as done.
    pub async fn delete(
        &self,
        attachment_id: Uuid,
        storage_path: &str,
    ) -> Result<(), AttachmentError> {
        self.db
            .delete_attachment(&attachment_id.to_string())
            .map_err(|e| AttachmentError::Persistence(e.to_string()))?;

        if !storage_path.is_empty() {
            if let Err(e) = self.bucket.remove(&[storage_path.to_string()]).await {
                warn!(
                    "Record for {} deleted but object {} removal failed: {}",
                    attachment_id, storage_path, e
                );
            }
        }

        Ok(())
    }

    /// Delete every attachment of an announcement. Object removal is
    /// best-effort; record removal is not.
    pub async fn delete_all(&self, announcement_id: Uuid) -> Result<(), AttachmentError> {
        let rows = self
            .db
            .list_attachments(&announcement_id.to_string())
            .map_err(|e| AttachmentError::Persistence(e.to_string()))?;

        if rows.is_empty() {
            return Ok(());
        }

        let paths: Vec<String> = rows
            .iter()
            .map(|row| row.storage_path.clone())
            .filter(|path| !path.is_empty())
            .collect();
        if !paths.is_empty() {
            if let Err(e) = self.bucket.remove(&paths).await {
                warn!(
                    "Object removal for announcement {} incomplete: {}",
                    announcement_id, e
                );
            }
        }

        self.db
            .delete_attachments_for(&announcement_id.to_string())
            .map_err(|e| AttachmentError::Persistence(e.to_string()))?;

        Ok(())
    }

    /// All attachments of an announcement, in display order.
    pub async fn list(&self, announcement_id: Uuid) -> Result<Vec<Attachment>, AttachmentError> {
        let rows = self
            .db
            .list_attachments(&announcement_id.to_string())
            .map_err(|e| AttachmentError::Persistence(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                row.into_attachment()
                    .map_err(|e| AttachmentError::Persistence(e.to_string()))
            })
            .collect()
    }

    /// Public URL for a stored object. Pure derivation.
    pub fn get_url(&self, storage_path: &str) -> String {
        self.bucket.public_url(storage_path)
    }

    /// Time-limited URL for a stored object.
    pub async fn get_signed_url(
        &self,
        storage_path: &str,
        expires_in: u64,
    ) -> Result<String, AttachmentError> {
        self.bucket
            .signed_url(storage_path, expires_in)
            .await
            .map_err(|e| AttachmentError::Access(e.to_string()))
    }
}

/// Collision-resistant object path scoped under the announcement:
/// `announcements/{id}/{timestamp_millis}_{rand7}[.ext]`.
fn storage_path_for(announcement_id: Uuid, file_name: &str) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();

    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => {
            format!("announcements/{announcement_id}/{timestamp}_{suffix}.{ext}")
        }
        _ => format!("announcements/{announcement_id}/{timestamp}_{suffix}"),
    }
}
