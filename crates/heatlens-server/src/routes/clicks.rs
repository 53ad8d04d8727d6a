use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use heatlens_core::analytics::{ClickLogQuery, DEFAULT_CLICK_LOG_LIMIT, MAX_CLICK_LOG_LIMIT};

use crate::{
    auth::AuthContext,
    error::AppError,
    routes::{owned_site, page_limit, window},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ClickLogParams {
    pub days: Option<u32>,
    pub path: Option<String>,
    pub selector: Option<String>,
    pub has_href: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ClickIssueParams {
    pub days: Option<u32>,
    pub path: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `GET /api/sites/{site_id}/clicks` — paginated raw click log, newest first.
#[tracing::instrument(skip(state, auth))]
pub async fn get_click_log(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
    Query(params): Query<ClickLogParams>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let query = ClickLogQuery {
        window: window(params.days)?,
        path: non_empty(params.path),
        selector_contains: non_empty(params.selector),
        has_href: params.has_href,
        limit: page_limit(params.limit, DEFAULT_CLICK_LOG_LIMIT, MAX_CLICK_LOG_LIMIT)?,
        offset: params.offset.unwrap_or(0),
    };

    let page = state.analytics.get_click_log(&site_id, &query).await?;
    Ok(Json(json!({ "data": page })))
}

/// `GET /api/sites/{site_id}/clicks/issues` — rage/dead roll-up by selector.
#[tracing::instrument(skip(state, auth))]
pub async fn get_click_issues(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
    Query(params): Query<ClickIssueParams>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let window = window(params.days)?;
    let path = non_empty(params.path);

    let issues = state
        .analytics
        .get_click_issues(
            &site_id,
            &window,
            path.as_deref(),
            state.config.heatmap.max_rows,
        )
        .await?;
    Ok(Json(json!({ "data": issues })))
}
