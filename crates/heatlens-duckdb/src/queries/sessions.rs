use std::collections::HashMap;

use anyhow::Result;
use duckdb::Connection;

use heatlens_core::analytics::TimeWindow;
use heatlens_core::session::{build_timeline, summarize_sessions, SessionSummary, SessionTimeline};

use crate::queries::rows::{load_clicks, load_pageviews, load_scrolls, Keep, Scope};
use crate::DuckDbBackend;

/// Ids of the `limit` sessions in scope with the latest activity, newest first.
fn recent_session_ids(conn: &Connection, scope: &Scope, limit: u32) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT p.session_id FROM pageviews p WHERE {} \
         GROUP BY p.session_id \
         ORDER BY MAX(p.created_at) DESC, p.session_id \
         LIMIT {limit}",
        scope.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(scope.refs().as_slice(), |row| row.get::<_, String>(0))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Most recently active sessions first. Sessions are chosen before any
/// pageview is loaded, so the row cap only trims the oldest pageviews of
/// the chosen sessions.
pub async fn list_sessions_inner(
    db: &DuckDbBackend,
    site_id: &str,
    window: &TimeWindow,
    limit: u32,
    max_rows: usize,
) -> Result<Vec<SessionSummary>> {
    let conn = db.conn.lock().await;
    let mut scope = Scope::new(site_id, Some(window), None);
    let session_ids = recent_session_ids(&conn, &scope, limit)?;
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }
    scope.restrict_sessions(&session_ids);

    let pageviews = load_pageviews(&conn, &scope, Keep::Newest(max_rows))?;
    let dwell: HashMap<String, u64> = load_scrolls(&conn, &scope, Keep::Newest(max_rows))?
        .into_iter()
        .map(|s| (s.pageview_id, s.dwell_ms))
        .collect();

    let mut summaries = summarize_sessions(&pageviews, &dwell);
    summaries.truncate(limit as usize);
    Ok(summaries)
}

/// Full timeline of one session. Sessions are not windowed: every pageview
/// sharing the id on this site is included, up to `max_rows` per table.
pub async fn get_session_timeline_inner(
    db: &DuckDbBackend,
    site_id: &str,
    session_id: &str,
    max_rows: usize,
) -> Result<Option<SessionTimeline>> {
    let conn = db.conn.lock().await;
    let mut scope = Scope::new(site_id, None, None);
    let idx = scope.push(Box::new(session_id.to_string()));
    scope.clause.push_str(&format!(" AND p.session_id = ?{idx}"));

    let pageviews = load_pageviews(&conn, &scope, Keep::Oldest(max_rows))?;
    if pageviews.is_empty() {
        return Ok(None);
    }
    let scrolls = load_scrolls(&conn, &scope, Keep::Oldest(max_rows))?;
    let clicks = load_clicks(&conn, &scope, Keep::Oldest(max_rows))?;
    Ok(build_timeline(session_id, &pageviews, &scrolls, &clicks))
}
