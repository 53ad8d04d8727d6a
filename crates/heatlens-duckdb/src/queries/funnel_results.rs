use anyhow::Result;

use heatlens_core::analytics::TimeWindow;
use heatlens_core::funnel::{evaluate_funnel, FunnelReport};

use crate::queries::funnels::get_funnel_with_conn;
use crate::queries::rows::{load_pageviews, Keep, Scope};
use crate::DuckDbBackend;

/// Evaluate a stored funnel against the sessions of the newest `max_rows`
/// pageviews in the window.
pub async fn get_funnel_results_inner(
    db: &DuckDbBackend,
    site_id: &str,
    funnel_id: &str,
    window: &TimeWindow,
    max_rows: usize,
) -> Result<Option<FunnelReport>> {
    let conn = db.conn.lock().await;
    let Some(funnel) = get_funnel_with_conn(&conn, site_id, funnel_id)? else {
        return Ok(None);
    };
    let pageviews = load_pageviews(
        &conn,
        &Scope::new(site_id, Some(window), None),
        Keep::Newest(max_rows),
    )?;
    Ok(Some(evaluate_funnel(&funnel, &pageviews)))
}
