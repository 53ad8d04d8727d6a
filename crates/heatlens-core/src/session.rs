//! Session reconstruction: grouping pageviews by session id and building a
//! chronological timeline for one session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{ClickRow, PageviewRow, ScrollRow};

/// Pageviews of one session, oldest first.
#[derive(Debug, Clone)]
pub struct SessionPageviews<'a> {
    pub session_id: &'a str,
    pub pageviews: Vec<&'a PageviewRow>,
}

impl SessionPageviews<'_> {
    pub fn first(&self) -> Option<&PageviewRow> {
        self.pageviews.first().copied()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.pageviews.iter().map(|pv| pv.path.as_str())
    }
}

/// Group pageviews by session id. Pageviews inside a session are ordered by
/// `(created_at, id)`; sessions are ordered by their first pageview.
pub fn group_sessions(pageviews: &[PageviewRow]) -> Vec<SessionPageviews<'_>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut sessions: Vec<SessionPageviews<'_>> = Vec::new();

    for pv in pageviews {
        let idx = *index.entry(pv.session_id.as_str()).or_insert_with(|| {
            sessions.push(SessionPageviews {
                session_id: pv.session_id.as_str(),
                pageviews: Vec::new(),
            });
            sessions.len() - 1
        });
        sessions[idx].pageviews.push(pv);
    }

    for session in &mut sessions {
        session
            .pageviews
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    }
    sessions.sort_by(|a, b| {
        let a_first = a.pageviews.first().map(|pv| pv.created_at);
        let b_first = b.pageviews.first().map(|pv| pv.created_at);
        a_first
            .cmp(&b_first)
            .then_with(|| a.session_id.cmp(b.session_id))
    });
    sessions
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub pageview_count: usize,
    pub entry_path: String,
    pub exit_path: String,
    pub total_dwell_ms: u64,
}

/// Per-session summaries, most recently active first.
pub fn summarize_sessions(
    pageviews: &[PageviewRow],
    dwell_by_pageview: &HashMap<String, u64>,
) -> Vec<SessionSummary> {
    let mut summaries: Vec<SessionSummary> = group_sessions(pageviews)
        .into_iter()
        .filter_map(|session| {
            let first = session.pageviews.first()?;
            let last = session.pageviews.last()?;
            Some(SessionSummary {
                session_id: session.session_id.to_string(),
                first_seen: first.created_at,
                last_seen: last.created_at,
                pageview_count: session.pageviews.len(),
                entry_path: first.path.clone(),
                exit_path: last.path.clone(),
                total_dwell_ms: session
                    .pageviews
                    .iter()
                    .filter_map(|pv| dwell_by_pageview.get(&pv.id))
                    .sum(),
            })
        })
        .collect();
    summaries.sort_by(|a, b| {
        b.last_seen
            .cmp(&a.last_seen)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    summaries
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEntry {
    Pageview {
        at: DateTime<Utc>,
        pageview_id: String,
        path: String,
        title: Option<String>,
        referrer: Option<String>,
    },
    Click {
        at: DateTime<Utc>,
        pageview_id: String,
        path: String,
        x: i64,
        y: i64,
        selector: Option<String>,
        text: Option<String>,
        is_rage: bool,
        is_dead: bool,
    },
    Scroll {
        at: DateTime<Utc>,
        pageview_id: String,
        max_depth: u32,
        dwell_ms: u64,
    },
}

impl TimelineEntry {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            TimelineEntry::Pageview { at, .. }
            | TimelineEntry::Click { at, .. }
            | TimelineEntry::Scroll { at, .. } => *at,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TimelineEntry::Pageview { .. } => 0,
            TimelineEntry::Click { .. } => 1,
            TimelineEntry::Scroll { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTimeline {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub pageview_count: usize,
    pub total_dwell_ms: u64,
    pub click_count: usize,
    pub rage_clicks: usize,
    pub dead_clicks: usize,
    pub entry_path: String,
    pub exit_path: String,
    pub entries: Vec<TimelineEntry>,
}

/// Build the chronological timeline of one session. Returns `None` when the
/// session has no pageviews.
pub fn build_timeline(
    session_id: &str,
    pageviews: &[PageviewRow],
    scrolls: &[ScrollRow],
    clicks: &[ClickRow],
) -> Option<SessionTimeline> {
    let session = group_sessions(pageviews)
        .into_iter()
        .find(|s| s.session_id == session_id)?;
    let first = session.pageviews.first()?;
    let last = session.pageviews.last()?;

    let mut entries: Vec<TimelineEntry> = session
        .pageviews
        .iter()
        .map(|pv| TimelineEntry::Pageview {
            at: pv.created_at,
            pageview_id: pv.id.clone(),
            path: pv.path.clone(),
            title: pv.title.clone(),
            referrer: pv.referrer.clone(),
        })
        .collect();

    let in_session = |pageview_id: &str| session.pageviews.iter().any(|pv| pv.id == pageview_id);

    let session_clicks: Vec<&ClickRow> = clicks
        .iter()
        .filter(|c| in_session(&c.pageview_id))
        .collect();
    entries.extend(session_clicks.iter().map(|c| TimelineEntry::Click {
        at: c.created_at,
        pageview_id: c.pageview_id.clone(),
        path: c.path.clone(),
        x: c.x,
        y: c.y,
        selector: c.selector.clone(),
        text: c.text.clone(),
        is_rage: c.is_rage,
        is_dead: c.is_dead,
    }));

    let session_scrolls: Vec<&ScrollRow> = scrolls
        .iter()
        .filter(|s| in_session(&s.pageview_id))
        .collect();
    entries.extend(session_scrolls.iter().map(|s| TimelineEntry::Scroll {
        at: s.updated_at,
        pageview_id: s.pageview_id.clone(),
        max_depth: s.max_depth,
        dwell_ms: s.dwell_ms,
    }));

    entries.sort_by(|a, b| a.at().cmp(&b.at()).then_with(|| a.rank().cmp(&b.rank())));

    let ended_at = entries.last().map(TimelineEntry::at).unwrap_or(last.created_at);
    Some(SessionTimeline {
        session_id: session_id.to_string(),
        started_at: first.created_at,
        ended_at,
        duration_seconds: (ended_at - first.created_at).num_seconds().max(0),
        pageview_count: session.pageviews.len(),
        total_dwell_ms: session_scrolls.iter().map(|s| s.dwell_ms).sum(),
        click_count: session_clicks.len(),
        rage_clicks: session_clicks.iter().filter(|c| c.is_rage).count(),
        dead_clicks: session_clicks.iter().filter(|c| c.is_dead).count(),
        entry_path: first.path.clone(),
        exit_path: last.path.clone(),
        entries,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::event::PageviewRow;

    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn pageview(id: &str, session: &str, path: &str, offset_secs: i64) -> PageviewRow {
        PageviewRow {
            id: id.to_string(),
            site_id: "site_1".to_string(),
            session_id: session.to_string(),
            path: path.to_string(),
            url: format!("https://example.com{path}"),
            title: None,
            referrer: None,
            user_agent: None,
            screen_w: None,
            screen_h: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            page_height: None,
            created_at: base_time() + Duration::seconds(offset_secs),
        }
    }
}
