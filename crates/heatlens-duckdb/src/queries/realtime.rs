use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use heatlens_core::analytics::{RealtimeResult, REALTIME_TOP_PATHS, REALTIME_WINDOW_MINUTES};
use heatlens_core::rollup::NamedCount;

use crate::backend::ts;
use crate::DuckDbBackend;

/// Active visitors and top paths over the trailing window, computed from
/// stored pageviews on every call.
pub async fn get_realtime_inner(
    db: &DuckDbBackend,
    site_id: &str,
    now: DateTime<Utc>,
) -> Result<RealtimeResult> {
    let conn = db.conn.lock().await;
    let cutoff = ts(now - Duration::minutes(REALTIME_WINDOW_MINUTES));

    let active_visitors: i64 = conn
        .prepare(
            "SELECT COUNT(DISTINCT session_id) FROM pageviews \
             WHERE site_id = ?1 AND created_at >= ?2",
        )?
        .query_row(duckdb::params![site_id, cutoff], |row| row.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT path, COUNT(*) AS views FROM pageviews \
         WHERE site_id = ?1 AND created_at >= ?2 \
         GROUP BY path ORDER BY views DESC, path ASC LIMIT ?3",
    )?;
    let rows = stmt.query_map(
        duckdb::params![site_id, cutoff, REALTIME_TOP_PATHS as i64],
        |row| {
            Ok(NamedCount {
                name: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as u64,
            })
        },
    )?;
    let mut top_paths = Vec::new();
    for row in rows {
        top_paths.push(row?);
    }

    Ok(RealtimeResult {
        active_visitors: active_visitors.max(0) as u64,
        window_minutes: REALTIME_WINDOW_MINUTES,
        top_paths,
    })
}
