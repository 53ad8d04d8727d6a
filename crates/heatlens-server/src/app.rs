use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::require_auth, routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Ingestion routes under `/api/track` are open and carry permissive CORS:
/// the instrument runs on third-party origins. Every `/api/sites` route
/// requires a Bearer API key and is scoped to the key's account; their
/// responses are gzip-compressed when the client accepts it.
pub fn build_app(state: Arc<AppState>) -> Router {
    let track = Router::new()
        .route("/api/track/pageview", post(routes::track::pageview))
        .route("/api/track/scroll", post(routes::track::scroll))
        .route("/api/track/clicks", post(routes::track::clicks))
        .route("/api/track/pointer", post(routes::track::pointer))
        .route("/api/track/height", post(routes::track::height))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let sites = Router::new()
        .route(
            "/api/sites",
            post(routes::sites::create_site).get(routes::sites::list_sites),
        )
        .route(
            "/api/sites/{site_id}",
            axum::routing::patch(routes::sites::update_site).delete(routes::sites::delete_site),
        )
        .route("/api/sites/{site_id}/heatmap", get(routes::heatmap::get_heatmap))
        .route("/api/sites/{site_id}/clicks", get(routes::clicks::get_click_log))
        .route(
            "/api/sites/{site_id}/clicks/issues",
            get(routes::clicks::get_click_issues),
        )
        .route(
            "/api/sites/{site_id}/sessions",
            get(routes::sessions::list_sessions),
        )
        .route(
            "/api/sites/{site_id}/sessions/{session_id}",
            get(routes::sessions::get_session),
        )
        .route(
            "/api/sites/{site_id}/analytics",
            get(routes::analytics::get_analytics),
        )
        .route(
            "/api/sites/{site_id}/realtime",
            get(routes::realtime::get_realtime),
        )
        .route(
            "/api/sites/{site_id}/funnels",
            get(routes::funnels::list_funnels).post(routes::funnels::create_funnel),
        )
        .route(
            "/api/sites/{site_id}/funnels/{funnel_id}",
            get(routes::funnels::get_funnel)
                .put(routes::funnels::replace_funnel)
                .delete(routes::funnels::delete_funnel),
        )
        .route(
            "/api/sites/{site_id}/funnels/{funnel_id}/results",
            get(routes::funnels::get_funnel_results),
        )
        .route(
            "/api/sites/{site_id}/pageviews/{pageview_id}/pointer",
            get(routes::pointer::export_pointer),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ))
        .layer(CompressionLayer::new());

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(track)
        .merge(sites)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
