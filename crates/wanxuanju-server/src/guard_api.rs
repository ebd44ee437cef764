use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;

use wanxuanju_session::guard::{self, RouteDecision};

use crate::AppState;
use crate::auth::require_claims;

#[derive(Debug, Deserialize)]
pub struct GuardParams {
    pub path: String,
}

/// GET /api/guard?path=… — the navigation rule the SPA applies before
/// entering a route, evaluated against the caller's bearer token.
pub async fn decide_route(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GuardParams>,
) -> Json<serde_json::Value> {
    let authenticated = require_claims(&headers, &state).is_ok();

    let body = match guard::decide(&params.path, authenticated) {
        RouteDecision::Proceed => serde_json::json!({ "action": "proceed" }),
        RouteDecision::Redirect(to) => {
            serde_json::json!({ "action": "redirect", "to": to })
        }
    };
    Json(body)
}
