use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use heatlens_core::analytics::{DEFAULT_SESSION_LIST_LIMIT, MAX_SESSION_LIST_LIMIT};

use crate::{
    auth::AuthContext,
    error::AppError,
    routes::{owned_site, page_limit, window},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    pub days: Option<u32>,
    pub limit: Option<u32>,
}

/// `GET /api/sites/{site_id}/sessions` — most recent sessions first.
#[tracing::instrument(skip(state, auth))]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
    Query(query): Query<SessionListQuery>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let window = window(query.days)?;
    let limit = page_limit(query.limit, DEFAULT_SESSION_LIST_LIMIT, MAX_SESSION_LIST_LIMIT)?;

    let sessions = state
        .analytics
        .list_sessions(&site_id, &window, limit, state.config.heatmap.max_rows)
        .await?;
    Ok(Json(json!({ "data": sessions })))
}

/// `GET /api/sites/{site_id}/sessions/{session_id}` — ordered timeline.
#[tracing::instrument(skip(state, auth))]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((site_id, session_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;

    let timeline = state
        .analytics
        .get_session_timeline(&site_id, &session_id, state.config.heatmap.max_rows)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;
    Ok(Json(json!({ "data": timeline })))
}
