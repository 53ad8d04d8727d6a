use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use heatlens_core::event::truncate;

use crate::{
    auth::AuthContext,
    error::AppError,
    metadata::CreateSiteParams,
    routes::owned_site,
    state::AppState,
};

const MAX_DOMAIN_LEN: usize = 253;

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub domain: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSiteRequest {
    pub active: bool,
}

/// `POST /api/sites` — register a site and mint its public site key.
#[tracing::instrument(skip(state, auth, req))]
pub async fn create_site(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateSiteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let domain = req.domain.trim().to_ascii_lowercase();
    if domain.is_empty() {
        return Err(AppError::bad_request("domain is required", "domain"));
    }

    let site = state
        .metadata
        .create_site(CreateSiteParams {
            account_id: auth.account_id,
            domain: truncate(&domain, MAX_DOMAIN_LEN),
        })
        .await?;
    tracing::info!(site_id = %site.id, "site created");
    Ok((StatusCode::CREATED, Json(json!({ "data": site }))))
}

/// `GET /api/sites`
#[tracing::instrument(skip(state, auth))]
pub async fn list_sites(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let sites = state.metadata.list_sites(&auth.account_id).await?;
    Ok(Json(json!({ "data": sites })))
}

/// `PATCH /api/sites/{site_id}` — activate or deactivate ingestion.
#[tracing::instrument(skip(state, auth, req))]
pub async fn update_site(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
    Json(req): Json<UpdateSiteRequest>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;

    let site = state
        .metadata
        .set_site_active(&site_id, req.active)
        .await?
        .ok_or_else(|| AppError::NotFound("Site not found".to_string()))?;
    state.invalidate_site(&site_id).await;
    Ok(Json(json!({ "data": site })))
}

/// `DELETE /api/sites/{site_id}` — remove the site and all of its data.
#[tracing::instrument(skip(state, auth))]
pub async fn delete_site(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(site_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_site(&state, &auth, &site_id).await?;

    if !state.metadata.delete_site(&site_id).await? {
        return Err(AppError::NotFound("Site not found".to_string()));
    }
    state.invalidate_site(&site_id).await;
    tracing::info!(site_id = %site_id, "site deleted");
    Ok(StatusCode::NO_CONTENT)
}
