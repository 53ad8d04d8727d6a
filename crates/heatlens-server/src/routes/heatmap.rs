use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::AuthContext,
    error::AppError,
    routes::{owned_site, window},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct HeatmapQuery {
    pub path: Option<String>,
    pub days: Option<u32>,
}

/// `GET /api/sites/{site_id}/heatmap?path=&days=`
///
/// Scroll milestones, click grid, dwell, and attention profile for one path.
#[tracing::instrument(skip(state, auth))]
pub async fn get_heatmap(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
    Query(query): Query<HeatmapQuery>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let path = query
        .path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request("path is required", "path"))?;
    let window = window(query.days)?;

    let data = state
        .analytics
        .get_heatmap(&site_id, path, &window, &state.config.heatmap)
        .await?;
    Ok(Json(json!({ "data": data })))
}
