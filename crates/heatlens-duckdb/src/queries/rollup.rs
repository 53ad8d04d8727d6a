use std::collections::HashMap;

use anyhow::Result;

use heatlens_core::analytics::TimeWindow;
use heatlens_core::rollup::{compute_rollup, AnalyticsRollup};

use crate::queries::rows::{load_pageviews, load_scrolls, Keep, Scope};
use crate::DuckDbBackend;

/// Roll-up over the newest `max_rows` pageviews of the window.
pub async fn get_rollup_inner(
    db: &DuckDbBackend,
    site_id: &str,
    window: &TimeWindow,
    max_rows: usize,
) -> Result<AnalyticsRollup> {
    let conn = db.conn.lock().await;
    let scope = Scope::new(site_id, Some(window), None);
    let pageviews = load_pageviews(&conn, &scope, Keep::Newest(max_rows))?;
    let dwell: HashMap<String, u64> = load_scrolls(&conn, &scope, Keep::Newest(max_rows))?
        .into_iter()
        .map(|s| (s.pageview_id, s.dwell_ms))
        .collect();

    Ok(compute_rollup(
        &pageviews,
        &dwell,
        window.first_day(),
        window.last_day(),
    ))
}
