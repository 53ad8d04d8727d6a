//! Bounded row retrieval shared by the query modules.

use anyhow::Result;
use duckdb::types::ToSql;
use duckdb::Connection;

use heatlens_core::analytics::TimeWindow;
use heatlens_core::event::{ClickRow, PageviewRow, ScrollRow, ZONE_COUNT};

use crate::backend::{row_ts, ts};

pub(crate) const PAGEVIEW_COLUMNS: &str = "p.id, p.site_id, p.session_id, p.path, p.url, p.title, \
     p.referrer, p.user_agent, p.screen_w, p.screen_h, p.utm_source, p.utm_medium, \
     p.utm_campaign, p.page_height, CAST(p.created_at AS VARCHAR)";

pub(crate) type SqlParam = Box<dyn ToSql + Send + Sync>;

/// Row cap for a bounded load and which end of the ordering survives it.
/// Loaded rows are always returned oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keep {
    Oldest(usize),
    Newest(usize),
}

impl Keep {
    fn order_and_limit(self, columns: &str) -> String {
        match self {
            Keep::Oldest(n) => format!(" ORDER BY {columns} LIMIT {n}"),
            Keep::Newest(n) => {
                let desc: Vec<String> = columns
                    .split(',')
                    .map(|c| format!("{} DESC", c.trim()))
                    .collect();
                format!(" ORDER BY {} LIMIT {n}", desc.join(", "))
            }
        }
    }

    fn restore_order<T>(self, rows: &mut [T]) {
        if matches!(self, Keep::Newest(_)) {
            rows.reverse();
        }
    }
}

/// Site/window/path predicate over the pageviews alias `p`, with its params.
pub(crate) struct Scope {
    pub clause: String,
    pub params: Vec<SqlParam>,
}

impl Scope {
    pub fn new(site_id: &str, window: Option<&TimeWindow>, path: Option<&str>) -> Self {
        let mut clause = "p.site_id = ?1".to_string();
        let mut params: Vec<SqlParam> = vec![Box::new(site_id.to_string())];
        if let Some(window) = window {
            params.push(Box::new(ts(window.since)));
            clause.push_str(&format!(" AND p.created_at >= ?{}", params.len()));
            params.push(Box::new(ts(window.until)));
            clause.push_str(&format!(" AND p.created_at < ?{}", params.len()));
        }
        if let Some(path) = path {
            params.push(Box::new(path.to_string()));
            clause.push_str(&format!(" AND p.path = ?{}", params.len()));
        }
        Self { clause, params }
    }

    pub fn push(&mut self, value: SqlParam) -> usize {
        self.params.push(value);
        self.params.len()
    }

    /// Narrow the scope to the given sessions. An empty list matches nothing.
    pub fn restrict_sessions(&mut self, session_ids: &[String]) {
        if session_ids.is_empty() {
            self.clause.push_str(" AND FALSE");
            return;
        }
        let placeholders: Vec<String> = session_ids
            .iter()
            .map(|id| format!("?{}", self.push(Box::new(id.clone()))))
            .collect();
        self.clause
            .push_str(&format!(" AND p.session_id IN ({})", placeholders.join(", ")));
    }

    pub fn refs(&self) -> Vec<&dyn ToSql> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &dyn ToSql)
            .collect()
    }
}

fn opt_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

pub(crate) fn map_pageview(row: &duckdb::Row<'_>) -> duckdb::Result<PageviewRow> {
    Ok(PageviewRow {
        id: row.get(0)?,
        site_id: row.get(1)?,
        session_id: row.get(2)?,
        path: row.get(3)?,
        url: row.get(4)?,
        title: row.get(5)?,
        referrer: row.get(6)?,
        user_agent: row.get(7)?,
        screen_w: opt_u32(row.get(8)?),
        screen_h: opt_u32(row.get(9)?),
        utm_source: row.get(10)?,
        utm_medium: row.get(11)?,
        utm_campaign: row.get(12)?,
        page_height: opt_u32(row.get(13)?),
        created_at: row_ts(row.get(14)?)?,
    })
}

/// Pageviews in scope ordered by `(created_at, id)`, capped by `keep`.
pub(crate) fn load_pageviews(
    conn: &Connection,
    scope: &Scope,
    keep: Keep,
) -> Result<Vec<PageviewRow>> {
    let sql = format!(
        "SELECT {PAGEVIEW_COLUMNS} FROM pageviews p WHERE {}{}",
        scope.clause,
        keep.order_and_limit("p.created_at, p.id")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(scope.refs().as_slice(), map_pageview)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    keep.restore_order(&mut out);
    Ok(out)
}

fn map_scroll(row: &duckdb::Row<'_>) -> duckdb::Result<ScrollRow> {
    let has_zones: bool = row.get(3)?;
    let mut zones = [0u32; ZONE_COUNT];
    for (idx, slot) in zones.iter_mut().enumerate() {
        *slot = row.get::<_, i64>(4 + idx)?.max(0) as u32;
    }
    Ok(ScrollRow {
        pageview_id: row.get(0)?,
        max_depth: row.get::<_, i64>(1)?.max(0) as u32,
        dwell_ms: row.get::<_, i64>(2)?.max(0) as u64,
        zones: has_zones.then_some(zones),
        updated_at: row_ts(row.get(14)?)?,
    })
}

/// Scroll records of pageviews in scope, capped by `keep`.
pub(crate) fn load_scrolls(
    conn: &Connection,
    scope: &Scope,
    keep: Keep,
) -> Result<Vec<ScrollRow>> {
    let sql = format!(
        "SELECT s.pageview_id, s.max_depth, s.dwell_ms, s.has_zones, \
         s.zone_0, s.zone_1, s.zone_2, s.zone_3, s.zone_4, \
         s.zone_5, s.zone_6, s.zone_7, s.zone_8, s.zone_9, \
         CAST(s.updated_at AS VARCHAR) \
         FROM scroll_samples s JOIN pageviews p ON p.id = s.pageview_id \
         WHERE {}{}",
        scope.clause,
        keep.order_and_limit("p.created_at, p.id")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(scope.refs().as_slice(), map_scroll)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    keep.restore_order(&mut out);
    Ok(out)
}

pub(crate) const CLICK_COLUMNS: &str = "c.id, c.pageview_id, p.path, c.x, c.y, c.selector, \
     c.text, c.href, c.is_rage, c.is_dead, CAST(c.created_at AS VARCHAR)";

pub(crate) fn map_click(row: &duckdb::Row<'_>) -> duckdb::Result<ClickRow> {
    Ok(ClickRow {
        id: row.get(0)?,
        pageview_id: row.get(1)?,
        path: row.get(2)?,
        x: row.get(3)?,
        y: row.get(4)?,
        selector: row.get(5)?,
        text: row.get(6)?,
        href: row.get(7)?,
        is_rage: row.get(8)?,
        is_dead: row.get(9)?,
        created_at: row_ts(row.get(10)?)?,
    })
}

/// Clicks on pageviews in scope, oldest first, capped by `keep`.
pub(crate) fn load_clicks(
    conn: &Connection,
    scope: &Scope,
    keep: Keep,
) -> Result<Vec<ClickRow>> {
    let sql = format!(
        "SELECT {CLICK_COLUMNS} FROM clicks c JOIN pageviews p ON p.id = c.pageview_id \
         WHERE {}{}",
        scope.clause,
        keep.order_and_limit("c.created_at, c.id")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(scope.refs().as_slice(), map_click)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    keep.restore_order(&mut out);
    Ok(out)
}
