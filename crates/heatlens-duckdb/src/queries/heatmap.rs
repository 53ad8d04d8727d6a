use anyhow::Result;

use heatlens_core::analytics::TimeWindow;
use heatlens_core::heatmap::{build_heatmap, HeatmapConfig, HeatmapResult};

use crate::queries::rows::{load_clicks, load_scrolls, Keep, Scope};
use crate::DuckDbBackend;

/// Heatmap for one page. Each retrieval (scroll records, clicks, page
/// heights) is capped at `config.max_rows`.
pub async fn get_heatmap_inner(
    db: &DuckDbBackend,
    site_id: &str,
    path: &str,
    window: &TimeWindow,
    config: &HeatmapConfig,
) -> Result<HeatmapResult> {
    let conn = db.conn.lock().await;
    let scope = Scope::new(site_id, Some(window), Some(path));

    let scrolls = load_scrolls(&conn, &scope, Keep::Newest(config.max_rows))?;
    let clicks = load_clicks(&conn, &scope, Keep::Newest(config.max_rows))?;

    let sql = format!(
        "SELECT p.page_height FROM pageviews p \
         WHERE {} AND p.page_height IS NOT NULL \
         ORDER BY p.created_at DESC LIMIT {}",
        scope.clause, config.max_rows
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(scope.refs().as_slice(), |row| row.get::<_, i64>(0))?;
    let mut heights = Vec::new();
    for row in rows {
        if let Ok(height) = u32::try_from(row?) {
            heights.push(height);
        }
    }

    Ok(build_heatmap(path, &scrolls, &clicks, &heights, config))
}
