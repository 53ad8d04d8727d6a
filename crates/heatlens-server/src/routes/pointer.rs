use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::{auth::AuthContext, error::AppError, routes::owned_site, state::AppState};

/// `GET /api/sites/{site_id}/pageviews/{pageview_id}/pointer`
///
/// Export of the stored pointer batches in insertion order.
#[tracing::instrument(skip(state, auth))]
pub async fn export_pointer(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((site_id, pageview_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;

    let batches = state
        .analytics
        .get_pointer_batches(&site_id, &pageview_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pageview not found".to_string()))?;
    Ok(Json(json!({ "data": batches })))
}
