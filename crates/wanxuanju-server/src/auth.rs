use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
};
use uuid::Uuid;

use wanxuanju_auth::{AuthError, token};
use wanxuanju_types::api::{
    Claims, ErrorResponse, LoginRequest, RegisterRequest, ResetPasswordRequest, SessionResponse,
    SignUpOutcome,
};
use wanxuanju_types::models::Session;

use crate::AppState;

pub type Rejection = (StatusCode, Json<ErrorResponse>);

pub fn reject(status: StatusCode, error: impl ToString) -> Rejection {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn reject_auth(e: AuthError) -> Rejection {
    let status = match &e {
        AuthError::InvalidCredentials | AuthError::EmailNotConfirmed => StatusCode::UNAUTHORIZED,
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::Invalid(_) => StatusCode::BAD_REQUEST,
        AuthError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    reject(status, e)
}

/// Validate the bearer token of a request. Admin handlers call this
/// before touching anything.
pub fn require_claims(headers: &HeaderMap, state: &AppState) -> Result<Claims, Rejection> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "missing bearer token"))?;

    token::decode_claims(state.auth.jwt_secret(), token)
        .map_err(|_| reject(StatusCode::UNAUTHORIZED, "invalid bearer token"))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Session>, Rejection> {
    let session = state
        .auth
        .sign_in_with_password(&req.email, &req.password)
        .await
        .map_err(reject_auth)?;
    Ok(Json(session))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SignUpOutcome>), Rejection> {
    let redirect = format!("{}/admin", state.site_origin);
    let outcome = state
        .auth
        .sign_up(&req.email, &req.password, req.metadata, &redirect)
        .await
        .map_err(reject_auth)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn logout(State(state): State<AppState>) -> Result<StatusCode, Rejection> {
    state.auth.sign_out().await.map_err(reject_auth)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<StatusCode, Rejection> {
    let redirect = format!("{}/admin/reset-password", state.site_origin);
    state
        .auth
        .reset_password_for_email(&req.email, &redirect)
        .await
        .map_err(reject_auth)?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn session(State(state): State<AppState>) -> Result<Json<SessionResponse>, Rejection> {
    let session = state.auth.current_session().await.map_err(reject_auth)?;
    Ok(Json(SessionResponse { session }))
}

pub async fn confirm(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    state.auth.confirm_email(user_id).await.map_err(reject_auth)?;
    Ok(StatusCode::NO_CONTENT)
}
