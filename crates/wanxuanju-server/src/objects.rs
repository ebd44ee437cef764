use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;

use wanxuanju_storage::StorageError;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignedParams {
    pub expires: Option<i64>,
    pub token: Option<String>,
}

/// GET /storage/{bucket}/{*path} — serve a stored object with the
/// headers recorded at upload. When signed-URL parameters are present
/// they must verify; without them the bucket is public.
pub async fn serve(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    Query(params): Query<SignedParams>,
) -> Result<impl IntoResponse, StatusCode> {
    if bucket != state.bucket.name() {
        return Err(StatusCode::NOT_FOUND);
    }

    if let (Some(expires), Some(token)) = (params.expires, params.token.as_deref()) {
        state
            .bucket
            .verify_signed(&path, expires, token)
            .map_err(|_| StatusCode::FORBIDDEN)?;
    }

    let (bytes, meta) = state.bucket.read(&path).await.map_err(|e| match e {
        StorageError::NotFound(_) | StorageError::InvalidPath(_) => StatusCode::NOT_FOUND,
        other => {
            error!("Failed to read object {}: {}", path, other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, meta.content_type),
            (
                header::CACHE_CONTROL,
                format!("max-age={}", meta.cache_control),
            ),
        ],
        bytes,
    ))
}
