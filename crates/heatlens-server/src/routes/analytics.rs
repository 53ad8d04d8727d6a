use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::{
    auth::AuthContext,
    error::AppError,
    routes::{owned_site, WindowQuery},
    state::AppState,
};

/// `GET /api/sites/{site_id}/analytics?days=` — totals, daily buckets and
/// distributions for the window.
#[tracing::instrument(skip(state, auth))]
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let window = query.window()?;

    let rollup = state
        .analytics
        .get_rollup(&site_id, &window, state.config.heatmap.max_rows)
        .await?;
    Ok(Json(json!({ "data": rollup })))
}
