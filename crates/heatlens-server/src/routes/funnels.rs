use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use heatlens_core::funnel::{FunnelDefinition, MAX_FUNNELS_PER_SITE};

use crate::{
    auth::AuthContext,
    error::AppError,
    routes::{owned_site, WindowQuery},
    state::AppState,
};

fn funnel_not_found() -> AppError {
    AppError::NotFound("Funnel not found".to_string())
}

/// `GET /api/sites/{site_id}/funnels`
#[tracing::instrument(skip(state, auth))]
pub async fn list_funnels(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let data = state.analytics.list_funnels(&site_id).await?;
    Ok(Json(json!({ "data": data })))
}

/// `GET /api/sites/{site_id}/funnels/{funnel_id}`
#[tracing::instrument(skip(state, auth))]
pub async fn get_funnel(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((site_id, funnel_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let data = state
        .analytics
        .get_funnel(&site_id, &funnel_id)
        .await?
        .ok_or_else(funnel_not_found)?;
    Ok(Json(json!({ "data": data })))
}

/// `POST /api/sites/{site_id}/funnels`
#[tracing::instrument(skip(state, auth, req))]
pub async fn create_funnel(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
    Json(req): Json<FunnelDefinition>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let definition = req.validate()?;

    let data = match state.analytics.create_funnel(&site_id, &definition).await {
        Ok(data) => data,
        Err(e) if e.to_string().contains("limit_exceeded") => {
            return Err(AppError::LimitExceeded(format!(
                "maximum of {MAX_FUNNELS_PER_SITE} funnels per site reached"
            )));
        }
        Err(e) => return Err(AppError::Internal(e)),
    };
    Ok((StatusCode::CREATED, Json(json!({ "data": data }))))
}

/// `PUT /api/sites/{site_id}/funnels/{funnel_id}` — replace name and steps.
#[tracing::instrument(skip(state, auth, req))]
pub async fn replace_funnel(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((site_id, funnel_id)): Path<(String, String)>,
    Json(req): Json<FunnelDefinition>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let definition = req.validate()?;

    let data = state
        .analytics
        .replace_funnel(&site_id, &funnel_id, &definition)
        .await?
        .ok_or_else(funnel_not_found)?;
    Ok(Json(json!({ "data": data })))
}

/// `DELETE /api/sites/{site_id}/funnels/{funnel_id}`
#[tracing::instrument(skip(state, auth))]
pub async fn delete_funnel(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((site_id, funnel_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    if !state.analytics.delete_funnel(&site_id, &funnel_id).await? {
        return Err(funnel_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/sites/{site_id}/funnels/{funnel_id}/results?days=`
#[tracing::instrument(skip(state, auth))]
pub async fn get_funnel_results(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((site_id, funnel_id)): Path<(String, String)>,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;
    let window = query.window()?;

    let report = state
        .analytics
        .get_funnel_results(&site_id, &funnel_id, &window, state.config.heatmap.max_rows)
        .await?
        .ok_or_else(funnel_not_found)?;
    Ok(Json(json!({ "data": report })))
}
