use anyhow::Result;

use heatlens_core::analytics::{ClickLogPage, ClickLogQuery, TimeWindow};
use heatlens_core::heatmap::{rollup_click_issues, ClickIssueRow};

use crate::queries::rows::{load_clicks, map_click, Keep, Scope, CLICK_COLUMNS};
use crate::DuckDbBackend;

/// Paginated click log, newest first, with the total matching count.
pub async fn get_click_log_inner(
    db: &DuckDbBackend,
    site_id: &str,
    query: &ClickLogQuery,
) -> Result<ClickLogPage> {
    let conn = db.conn.lock().await;
    let mut scope = Scope::new(site_id, None, query.path.as_deref());

    // Clicks are windowed on their own timestamp, not the pageview's.
    let since = scope.push(Box::new(crate::backend::ts(query.window.since)));
    let until = scope.push(Box::new(crate::backend::ts(query.window.until)));
    scope.clause.push_str(&format!(
        " AND c.created_at >= ?{since} AND c.created_at < ?{until}"
    ));
    if let Some(fragment) = query.selector_contains.as_deref() {
        let idx = scope.push(Box::new(fragment.to_string()));
        scope
            .clause
            .push_str(&format!(" AND contains(COALESCE(c.selector, ''), ?{idx})"));
    }
    match query.has_href {
        Some(true) => scope.clause.push_str(" AND c.href IS NOT NULL"),
        Some(false) => scope.clause.push_str(" AND c.href IS NULL"),
        None => {}
    }

    let count_sql = format!(
        "SELECT COUNT(*) FROM clicks c JOIN pageviews p ON p.id = c.pageview_id WHERE {}",
        scope.clause
    );
    let total: i64 = conn
        .prepare(&count_sql)?
        .query_row(scope.refs().as_slice(), |row| row.get(0))?;

    let sql = format!(
        "SELECT {CLICK_COLUMNS} FROM clicks c JOIN pageviews p ON p.id = c.pageview_id \
         WHERE {} ORDER BY c.created_at DESC, c.id LIMIT {} OFFSET {}",
        scope.clause, query.limit, query.offset
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(scope.refs().as_slice(), map_click)?;
    let mut clicks = Vec::new();
    for row in rows {
        clicks.push(row?);
    }

    Ok(ClickLogPage {
        total: total.max(0) as u64,
        limit: query.limit,
        offset: query.offset,
        clicks,
    })
}

pub async fn get_click_issues_inner(
    db: &DuckDbBackend,
    site_id: &str,
    window: &TimeWindow,
    path: Option<&str>,
    max_rows: usize,
) -> Result<Vec<ClickIssueRow>> {
    let conn = db.conn.lock().await;
    let scope = Scope::new(site_id, Some(window), path);
    let clicks = load_clicks(&conn, &scope, Keep::Newest(max_rows))?;
    Ok(rollup_click_issues(&clicks))
}
