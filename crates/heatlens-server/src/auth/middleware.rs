use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, state::AppState};

use super::api_keys::hash_api_key;

/// Auth context injected into request extensions after successful auth.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: String,
    pub api_key_id: String,
}

/// Require a `Bearer` API key and resolve it to the owning account.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return AppError::Unauthorized.into_response();
    };

    match state.metadata.lookup_api_key(&hash_api_key(&token)).await {
        Ok(Some(record)) => {
            let key_id = record.id.clone();
            request.extensions_mut().insert(AuthContext {
                account_id: record.account_id,
                api_key_id: record.id,
            });
            let resp = next.run(request).await;
            // Fire-and-forget: update last_used_at.
            let metadata = state.metadata.clone();
            tokio::spawn(async move {
                if let Err(e) = metadata.touch_api_key(&key_id).await {
                    tracing::debug!(error = %e, "touch_api_key failed");
                }
            });
            resp
        }
        Ok(None) => AppError::Unauthorized.into_response(),
        Err(e) => AppError::Internal(e).into_response(),
    }
}
