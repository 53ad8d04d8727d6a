//! Ingestion endpoints called by the instrument.
//!
//! Bodies are read as raw bytes and decoded with [`parse_json`] because
//! beacon deliveries arrive as `text/plain`. No route here requires auth;
//! pageviews are admitted by site key and every other event by the pageview
//! id the pageview call returned.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use heatlens_core::{
    analytics::Ingested,
    event::{
        parse_json, validate_clicks, ClickPayload, PageHeightPayload, PageviewPayload,
        PointerBatchPayload, ScrollPayload,
    },
};

use crate::{error::AppError, state::AppState};

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn enforce_rate_limit(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    if state.check_rate_limit(&client_ip(headers)).await {
        Ok(())
    } else {
        Err(AppError::RateLimited)
    }
}

fn stored<T>(outcome: Ingested<T>) -> Result<T, AppError> {
    match outcome {
        Ingested::Stored(value) => Ok(value),
        Ingested::UnknownPageview(id) => {
            Err(AppError::NotFound(format!("Unknown pageview: {id}")))
        }
    }
}

/// `POST /api/track/pageview` — record a page load and return its id.
#[tracing::instrument(skip(state, headers, body))]
pub async fn pageview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, &headers).await?;
    let payload: PageviewPayload = parse_json(&body)?;

    let site_id = state
        .resolve_site_key(payload.site_key()?)
        .await
        .ok_or(AppError::InvalidSite)?;

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let pageview = payload.into_pageview(&site_id, user_agent, Utc::now())?;

    let id = state.analytics.create_pageview(&pageview).await?;
    tracing::debug!(site_id = %site_id, pageview_id = %id, "pageview recorded");
    Ok(Json(json!({ "id": id })))
}

/// `POST /api/track/scroll` — merge a scroll flush into the pageview's state.
#[tracing::instrument(skip(state, headers, body))]
pub async fn scroll(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, &headers).await?;
    let (pageview_id, sample) = parse_json::<ScrollPayload>(&body)?.validate()?;

    stored(
        state
            .analytics
            .merge_scroll(&pageview_id, &sample, Utc::now())
            .await?,
    )?;
    Ok(Json(json!({ "ok": true })))
}

/// `POST /api/track/clicks` — store a batch of 1..=50 labeled clicks.
///
/// The batch is all-or-nothing: one unknown pageview id rejects every click.
#[tracing::instrument(skip(state, headers, body))]
pub async fn clicks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, &headers).await?;
    let payloads: Vec<ClickPayload> = parse_json(&body)?;
    let clicks = validate_clicks(payloads, Utc::now())?;

    let count = stored(state.analytics.insert_clicks(&clicks).await?)?;
    Ok(Json(json!({ "ok": true, "count": count })))
}

/// `POST /api/track/pointer` — append a pointer-movement batch.
#[tracing::instrument(skip(state, headers, body))]
pub async fn pointer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, &headers).await?;
    let (pageview_id, samples) = parse_json::<PointerBatchPayload>(&body)?.validate()?;

    stored(
        state
            .analytics
            .insert_pointer_batch(&pageview_id, &samples, Utc::now())
            .await?,
    )?;
    Ok(Json(json!({ "ok": true, "count": samples.len() })))
}

/// `POST /api/track/height` — record the document height of a pageview.
#[tracing::instrument(skip(state, headers, body))]
pub async fn height(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, &headers).await?;
    let (pageview_id, height) = parse_json::<PageHeightPayload>(&body)?.validate()?;

    stored(state.analytics.set_page_height(&pageview_id, height).await?)?;
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().expect("header"));
        headers.insert("x-real-ip", "10.0.0.9".parse().expect("header"));
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn client_ip_falls_back_to_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
