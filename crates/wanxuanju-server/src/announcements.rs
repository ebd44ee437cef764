use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use wanxuanju_attachments::{DEFAULT_SIGNED_URL_TTL, UploadFile};
use wanxuanju_types::api::{AnnouncementDetail, CreateAnnouncementRequest};
use wanxuanju_types::models::{Announcement, Attachment};

use crate::AppState;
use crate::auth::{Rejection, reject, require_claims};

/// 50 MB upload limit for attachments
const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

fn internal(e: impl std::fmt::Display) -> Rejection {
    error!("Request failed: {}", e);
    reject(StatusCode::INTERNAL_SERVER_ERROR, e)
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Announcement>>, Rejection> {
    let rows = state.db.list_announcements().map_err(internal)?;
    let announcements = rows
        .into_iter()
        .map(|row| row.into_announcement())
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(internal)?;
    Ok(Json(announcements))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnnouncementDetail>, Rejection> {
    let row = state
        .db
        .get_announcement(&id.to_string())
        .map_err(internal)?
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "announcement not found"))?;

    let announcement = row.into_announcement().map_err(internal)?;
    let attachments = state
        .attachments
        .list(id)
        .await
        .map_err(internal)?;

    Ok(Json(AnnouncementDetail {
        announcement,
        attachments,
    }))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>), Rejection> {
    require_claims(&headers, &state)?;

    if req.title.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "title must not be empty"));
    }

    let announcement = Announcement {
        id: Uuid::new_v4(),
        title: req.title,
        body: req.body,
        created_at: Utc::now(),
    };
    state
        .db
        .insert_announcement(
            &announcement.id.to_string(),
            &announcement.title,
            &announcement.body,
            &announcement.created_at.to_rfc3339(),
        )
        .map_err(internal)?;

    Ok((StatusCode::CREATED, Json(announcement)))
}

/// Delete an announcement and everything attached to it. Attachments go
/// first — records and objects — then the announcement row.
pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    require_claims(&headers, &state)?;

    state
        .attachments
        .delete_all(id)
        .await
        .map_err(internal)?;

    let deleted = state
        .db
        .delete_announcement(&id.to_string())
        .map_err(internal)?;
    if deleted == 0 {
        return Err(reject(StatusCode::NOT_FOUND, "announcement not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub file_name: String,
    #[serde(default)]
    pub display_order: i32,
}

/// POST /api/announcements/{id}/attachments — raw bytes body, original
/// filename in the query, MIME type from the Content-Type header.
pub async fn upload_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<UploadParams>,
    bytes: Bytes,
) -> Result<(StatusCode, Json<Attachment>), Rejection> {
    require_claims(&headers, &state)?;

    if bytes.is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "empty upload"));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(reject(StatusCode::PAYLOAD_TOO_LARGE, "file too large"));
    }
    if state
        .db
        .get_announcement(&id.to_string())
        .map_err(internal)?
        .is_none()
    {
        return Err(reject(StatusCode::NOT_FOUND, "announcement not found"));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let file = UploadFile {
        name: params.file_name,
        content_type,
        bytes,
    };

    let attachment = state
        .attachments
        .upload(id, &file, params.display_order)
        .await
        .map_err(|e| reject(StatusCode::BAD_GATEWAY, e))?;

    Ok((StatusCode::CREATED, Json(attachment)))
}

pub async fn remove_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    require_claims(&headers, &state)?;

    let row = state
        .db
        .get_attachment(&id.to_string())
        .map_err(internal)?
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "attachment not found"))?;

    state
        .attachments
        .delete(id, &row.storage_path)
        .await
        .map_err(internal)?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SignedUrlParams {
    pub expires_in: Option<u64>,
}

pub async fn attachment_signed_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<SignedUrlParams>,
) -> Result<Json<serde_json::Value>, Rejection> {
    require_claims(&headers, &state)?;

    let row = state
        .db
        .get_attachment(&id.to_string())
        .map_err(internal)?
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "attachment not found"))?;

    let url = state
        .attachments
        .get_signed_url(
            &row.storage_path,
            params.expires_in.unwrap_or(DEFAULT_SIGNED_URL_TTL),
        )
        .await
        .map_err(|e| reject(StatusCode::BAD_GATEWAY, e))?;

    Ok(Json(serde_json::json!({ "signed_url": url })))
}
