use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;

use crate::{auth::AuthContext, error::AppError, routes::owned_site, state::AppState};

/// `GET /api/sites/{site_id}/realtime` — distinct sessions seen in the last
/// five minutes, computed on each call.
#[tracing::instrument(skip(state, auth))]
pub async fn get_realtime(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let data = state.analytics.get_realtime(&site_id, Utc::now()).await?;
    Ok(Json(json!({ "data": data })))
}
