//! Heatmap aggregation: scroll-depth milestones, the click grid, dwell and
//! attention averages, and the rage/dead roll-up by selector.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::{ClickRow, ScrollRow, ZONE_COUNT};

pub const SCROLL_MILESTONES: [u32; 7] = [0, 10, 25, 50, 75, 90, 100];
pub const DEFAULT_CELL_PX: i64 = 50;
pub const DEFAULT_TOP_CELLS: usize = 200;
pub const DEFAULT_MAX_ROWS: usize = 5000;
const MAX_ISSUE_ROWS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapConfig {
    pub cell_px: i64,
    pub top_cells: usize,
    /// Upper bound on rows retrieved per query.
    pub max_rows: usize,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            cell_px: DEFAULT_CELL_PX,
            top_cells: DEFAULT_TOP_CELLS,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollMilestone {
    pub depth: u32,
    /// Share of scroll samples reaching `depth`, 0–100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickCell {
    /// Cell center in document pixels.
    pub x: i64,
    pub y: i64,
    pub count: u64,
    pub top_selector: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapResult {
    pub path: String,
    pub cell_px: i64,
    pub total_scroll_samples: usize,
    pub total_clicks: usize,
    pub milestones: Vec<ScrollMilestone>,
    pub cells: Vec<ClickCell>,
    pub avg_dwell_ms: u64,
    /// Mean seconds of visibility per attention zone, top to bottom.
    pub attention: Vec<f64>,
    pub avg_page_height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickIssueRow {
    pub path: String,
    pub selector: String,
    pub rage_clicks: u64,
    pub dead_clicks: u64,
    pub total_clicks: u64,
    pub sample_text: Option<String>,
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Center of the grid cell containing `(x, y)`.
pub fn cell_center(x: i64, y: i64, cell_px: i64) -> (i64, i64) {
    let half = cell_px / 2;
    (
        x.div_euclid(cell_px) * cell_px + half,
        y.div_euclid(cell_px) * cell_px + half,
    )
}

pub fn scroll_milestones(depths: &[u32]) -> Vec<ScrollMilestone> {
    SCROLL_MILESTONES
        .iter()
        .map(|&depth| {
            let percentage = if depths.is_empty() {
                0.0
            } else {
                let reached = depths.iter().filter(|d| **d >= depth).count();
                round1(reached as f64 * 100.0 / depths.len() as f64)
            };
            ScrollMilestone { depth, percentage }
        })
        .collect()
}

/// Mean of positive dwell values; zero-dwell samples are not evidence.
pub fn average_dwell(dwells: impl IntoIterator<Item = u64>) -> u64 {
    let (sum, n) = dwells
        .into_iter()
        .filter(|d| *d > 0)
        .fold((0u128, 0u128), |(sum, n), d| (sum + d as u128, n + 1));
    if n == 0 {
        0
    } else {
        ((sum as f64) / (n as f64)).round() as u64
    }
}

/// Element-wise mean across the zone vectors that are present.
pub fn attention_profile<'a>(zones: impl IntoIterator<Item = &'a [u32; ZONE_COUNT]>) -> Vec<f64> {
    let mut totals = [0u64; ZONE_COUNT];
    let mut n = 0u64;
    for z in zones {
        for (total, value) in totals.iter_mut().zip(z.iter()) {
            *total += u64::from(*value);
        }
        n += 1;
    }
    totals
        .iter()
        .map(|t| if n == 0 { 0.0 } else { round1(*t as f64 / n as f64) })
        .collect()
}

struct CellAcc {
    x: i64,
    y: i64,
    count: u64,
    /// Selector counts in first-seen order.
    selectors: Vec<(String, u64)>,
}

impl CellAcc {
    fn top_selector(&self) -> Option<String> {
        let mut best: Option<&(String, u64)> = None;
        for entry in &self.selectors {
            match best {
                Some(b) if entry.1 <= b.1 => {}
                _ => best = Some(entry),
            }
        }
        best.map(|(s, _)| s.clone())
    }
}

/// Bin clicks into square cells and keep the busiest `top_cells`.
pub fn click_grid<'a>(
    clicks: impl IntoIterator<Item = (i64, i64, Option<&'a str>)>,
    config: &HeatmapConfig,
) -> Vec<ClickCell> {
    let mut index: HashMap<(i64, i64), usize> = HashMap::new();
    let mut cells: Vec<CellAcc> = Vec::new();

    for (x, y, selector) in clicks {
        let key = cell_center(x, y, config.cell_px);
        let idx = *index.entry(key).or_insert_with(|| {
            cells.push(CellAcc {
                x: key.0,
                y: key.1,
                count: 0,
                selectors: Vec::new(),
            });
            cells.len() - 1
        });
        let cell = &mut cells[idx];
        cell.count += 1;
        if let Some(selector) = selector.filter(|s| !s.is_empty()) {
            match cell.selectors.iter_mut().find(|(s, _)| s == selector) {
                Some(entry) => entry.1 += 1,
                None => cell.selectors.push((selector.to_string(), 1)),
            }
        }
    }

    // Stable sort keeps first-appearance order among equal counts.
    cells.sort_by(|a, b| b.count.cmp(&a.count));
    cells.truncate(config.top_cells);
    cells
        .into_iter()
        .map(|cell| ClickCell {
            top_selector: cell.top_selector(),
            x: cell.x,
            y: cell.y,
            count: cell.count,
        })
        .collect()
}

pub fn build_heatmap(
    path: &str,
    scrolls: &[ScrollRow],
    clicks: &[ClickRow],
    page_heights: &[u32],
    config: &HeatmapConfig,
) -> HeatmapResult {
    let depths: Vec<u32> = scrolls.iter().map(|s| s.max_depth).collect();
    let avg_page_height = if page_heights.is_empty() {
        None
    } else {
        let sum: u64 = page_heights.iter().map(|h| u64::from(*h)).sum();
        Some((sum as f64 / page_heights.len() as f64).round() as u32)
    };

    HeatmapResult {
        path: path.to_string(),
        cell_px: config.cell_px,
        total_scroll_samples: scrolls.len(),
        total_clicks: clicks.len(),
        milestones: scroll_milestones(&depths),
        cells: click_grid(
            clicks.iter().map(|c| (c.x, c.y, c.selector.as_deref())),
            config,
        ),
        avg_dwell_ms: average_dwell(scrolls.iter().map(|s| s.dwell_ms)),
        attention: attention_profile(scrolls.iter().filter_map(|s| s.zones.as_ref())),
        avg_page_height,
    }
}

/// Roll labeled clicks up by `(path, selector)`, keeping only groups with at
/// least one rage or dead click.
pub fn rollup_click_issues(clicks: &[ClickRow]) -> Vec<ClickIssueRow> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut rows: Vec<ClickIssueRow> = Vec::new();

    for click in clicks {
        let selector = click.selector.as_deref().unwrap_or("");
        let idx = *index
            .entry((click.path.as_str(), selector))
            .or_insert_with(|| {
                rows.push(ClickIssueRow {
                    path: click.path.clone(),
                    selector: selector.to_string(),
                    rage_clicks: 0,
                    dead_clicks: 0,
                    total_clicks: 0,
                    sample_text: None,
                });
                rows.len() - 1
            });
        let row = &mut rows[idx];
        row.total_clicks += 1;
        if click.is_rage {
            row.rage_clicks += 1;
        }
        if click.is_dead {
            row.dead_clicks += 1;
        }
        if row.sample_text.is_none() {
            row.sample_text = click.text.clone();
        }
    }

    rows.retain(|r| r.rage_clicks + r.dead_clicks > 0);
    rows.sort_by(|a, b| (b.rage_clicks + b.dead_clicks).cmp(&(a.rage_clicks + a.dead_clicks)));
    rows.truncate(MAX_ISSUE_ROWS);
    rows
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn click(x: i64, y: i64, selector: Option<&str>) -> ClickRow {
        ClickRow {
            id: format!("c_{x}_{y}"),
            pageview_id: "pv_1".to_string(),
            path: "/".to_string(),
            x,
            y,
            selector: selector.map(str::to_string),
            text: None,
            href: None,
            is_rage: false,
            is_dead: false,
            created_at: Utc::now(),
        }
    }

    fn scroll(depth: u32, dwell: u64) -> ScrollRow {
        ScrollRow {
            pageview_id: "pv_1".to_string(),
            max_depth: depth,
            dwell_ms: dwell,
            zones: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cell_keys_follow_fixed_grid() {
        assert_eq!(cell_center(3, 3, 50), (25, 25));
        assert_eq!(cell_center(49, 49, 50), (25, 25));
        assert_eq!(cell_center(50, 3, 50), (75, 25));
        assert_eq!(cell_center(-1, 0, 50), (-25, 25));
    }

    #[test]
    fn grid_counts_and_orders_cells() {
        let config = HeatmapConfig::default();
        let cells = click_grid(
            vec![
                (3, 3, Some("a")),
                (60, 3, Some("b")),
                (49, 49, Some("c")),
                (10, 10, Some("c")),
            ],
            &config,
        );
        assert_eq!(cells.len(), 2);
        assert_eq!((cells[0].x, cells[0].y, cells[0].count), (25, 25, 3));
        assert_eq!(cells[0].top_selector.as_deref(), Some("c"));
        assert_eq!((cells[1].x, cells[1].count), (75, 1));
    }

    #[test]
    fn top_selector_tie_goes_to_first_seen() {
        let config = HeatmapConfig::default();
        let cells = click_grid(
            vec![(1, 1, Some("b")), (2, 2, Some("a")), (3, 3, Some("a")), (4, 4, Some("b"))],
            &config,
        );
        assert_eq!(cells[0].top_selector.as_deref(), Some("b"));
    }

    #[test]
    fn grid_is_capped() {
        let config = HeatmapConfig {
            top_cells: 3,
            ..HeatmapConfig::default()
        };
        let clicks: Vec<(i64, i64, Option<&str>)> = (0..10).map(|i| (i * 50, 0, None)).collect();
        assert_eq!(click_grid(clicks, &config).len(), 3);
    }

    #[test]
    fn milestones_are_percentages_of_samples() {
        let milestones = scroll_milestones(&[100, 50, 20, 0]);
        let by_depth: Vec<(u32, f64)> = milestones.iter().map(|m| (m.depth, m.percentage)).collect();
        assert_eq!(
            by_depth,
            vec![
                (0, 100.0),
                (10, 75.0),
                (25, 50.0),
                (50, 50.0),
                (75, 25.0),
                (90, 25.0),
                (100, 25.0)
            ]
        );
        assert!(scroll_milestones(&[]).iter().all(|m| m.percentage == 0.0));
    }

    #[test]
    fn average_dwell_skips_zero_samples() {
        assert_eq!(average_dwell([0, 1000, 3000, 0]), 2000);
        assert_eq!(average_dwell([0, 0]), 0);
    }

    #[test]
    fn heatmap_assembles_all_parts() {
        let mut with_zones = scroll(80, 4000);
        with_zones.zones = Some([2, 2, 0, 0, 0, 0, 0, 0, 0, 0]);
        let result = build_heatmap(
            "/pricing",
            &[with_zones, scroll(30, 0)],
            &[click(10, 10, Some("button#buy"))],
            &[1200, 1800],
            &HeatmapConfig::default(),
        );
        assert_eq!(result.total_scroll_samples, 2);
        assert_eq!(result.avg_dwell_ms, 4000);
        assert_eq!(result.attention[0], 2.0);
        assert_eq!(result.avg_page_height, Some(1500));
        assert_eq!(result.cells.len(), 1);
    }

    #[test]
    fn issues_group_by_path_and_selector() {
        let mut rage = click(1, 1, Some("div.hero"));
        rage.is_rage = true;
        rage.text = Some("Hero".to_string());
        let mut dead = click(2, 2, Some("div.hero"));
        dead.is_dead = true;
        let fine = click(3, 3, Some("button#ok"));

        let rows = rollup_click_issues(&[rage.clone(), dead, rage, fine]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].selector, "div.hero");
        assert_eq!(rows[0].rage_clicks, 2);
        assert_eq!(rows[0].dead_clicks, 1);
        assert_eq!(rows[0].total_clicks, 3);
        assert_eq!(rows[0].sample_text.as_deref(), Some("Hero"));
    }
}
