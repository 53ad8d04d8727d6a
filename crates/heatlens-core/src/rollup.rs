//! Site-level analytics roll-up over a window of pageviews.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::enrich::{parse_user_agent, referrer_host, screen_label};
use crate::event::PageviewRow;
use crate::heatmap::round1;
use crate::session::group_sessions;

pub const TOP_DISTRIBUTION_LEN: usize = 10;
pub const NONE_LABEL: &str = "(none)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub pageviews: u64,
    pub sessions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRollup {
    pub total_pageviews: u64,
    pub total_sessions: u64,
    pub bounce_rate: f64,
    pub avg_pages_per_session: f64,
    pub avg_session_duration_ms: u64,
    pub daily: Vec<DailyBucket>,
    pub devices: Vec<NamedCount>,
    pub browsers: Vec<NamedCount>,
    pub operating_systems: Vec<NamedCount>,
    pub screens: Vec<NamedCount>,
    pub referrers: Vec<NamedCount>,
    pub utm_sources: Vec<NamedCount>,
    pub utm_mediums: Vec<NamedCount>,
    pub utm_campaigns: Vec<NamedCount>,
}

/// Sort by count descending, then name, optionally keeping only the head.
fn distribution(counts: HashMap<String, u64>, limit: Option<usize>) -> Vec<NamedCount> {
    let mut rows: Vec<NamedCount> = counts
        .into_iter()
        .map(|(name, count)| NamedCount { name, count })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

fn bump(map: &mut HashMap<String, u64>, key: String) {
    *map.entry(key).or_insert(0) += 1;
}

fn utm_label(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NONE_LABEL)
        .to_string()
}

/// Daily pageview and distinct-session counts for every day in
/// `first_day..=last_day`, including days without activity.
pub fn daily_buckets(
    pageviews: &[PageviewRow],
    first_day: NaiveDate,
    last_day: NaiveDate,
) -> Vec<DailyBucket> {
    let mut days: BTreeMap<NaiveDate, (u64, HashSet<&str>)> = BTreeMap::new();
    let mut day = first_day;
    while day <= last_day {
        days.insert(day, (0, HashSet::new()));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    for pv in pageviews {
        if let Some((count, sessions)) = days.get_mut(&pv.created_at.date_naive()) {
            *count += 1;
            sessions.insert(pv.session_id.as_str());
        }
    }
    days.into_iter()
        .map(|(date, (pageviews, sessions))| DailyBucket {
            date,
            pageviews,
            sessions: sessions.len() as u64,
        })
        .collect()
}

/// Compute the roll-up. `dwell_by_pageview` holds the merged scroll dwell of
/// every pageview that has one.
pub fn compute_rollup(
    pageviews: &[PageviewRow],
    dwell_by_pageview: &HashMap<String, u64>,
    first_day: NaiveDate,
    last_day: NaiveDate,
) -> AnalyticsRollup {
    let sessions = group_sessions(pageviews);
    let total_sessions = sessions.len() as u64;

    let mut devices = HashMap::new();
    let mut browsers = HashMap::new();
    let mut operating_systems = HashMap::new();
    let mut screens = HashMap::new();
    let mut referrers = HashMap::new();
    let mut utm_sources = HashMap::new();
    let mut utm_mediums = HashMap::new();
    let mut utm_campaigns = HashMap::new();

    let mut bounces = 0u64;
    let mut total_dwell = 0u64;

    for session in &sessions {
        if session.pageviews.len() == 1 {
            bounces += 1;
        }
        total_dwell += session
            .pageviews
            .iter()
            .filter_map(|pv| dwell_by_pageview.get(&pv.id))
            .sum::<u64>();

        let Some(entry) = session.first() else {
            continue;
        };
        let ua = parse_user_agent(entry.user_agent.as_deref());
        bump(&mut devices, ua.device);
        bump(&mut browsers, ua.browser);
        bump(&mut operating_systems, ua.os);
        bump(&mut screens, screen_label(entry.screen_w, entry.screen_h));
        bump(&mut referrers, referrer_host(entry.referrer.as_deref()));
        bump(&mut utm_sources, utm_label(entry.utm_source.as_deref()));
        bump(&mut utm_mediums, utm_label(entry.utm_medium.as_deref()));
        bump(&mut utm_campaigns, utm_label(entry.utm_campaign.as_deref()));
    }

    let (bounce_rate, avg_pages_per_session, avg_session_duration_ms) = if total_sessions == 0 {
        (0.0, 0.0, 0)
    } else {
        let sessions_f = total_sessions as f64;
        (
            round1(bounces as f64 / sessions_f * 100.0),
            round1(pageviews.len() as f64 / sessions_f),
            (total_dwell as f64 / sessions_f).round() as u64,
        )
    };

    let top = Some(TOP_DISTRIBUTION_LEN);
    AnalyticsRollup {
        total_pageviews: pageviews.len() as u64,
        total_sessions,
        bounce_rate,
        avg_pages_per_session,
        avg_session_duration_ms,
        daily: daily_buckets(pageviews, first_day, last_day),
        devices: distribution(devices, None),
        browsers: distribution(browsers, None),
        operating_systems: distribution(operating_systems, None),
        screens: distribution(screens, top),
        referrers: distribution(referrers, top),
        utm_sources: distribution(utm_sources, top),
        utm_mediums: distribution(utm_mediums, top),
        utm_campaigns: distribution(utm_campaigns, top),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixtures::{base_time, pageview};

    fn day(offset: i64) -> NaiveDate {
        (base_time() + chrono::Duration::days(offset)).date_naive()
    }

    #[test]
    fn seven_of_ten_single_page_sessions_is_seventy_percent() {
        let mut rows = Vec::new();
        for s in 0..10 {
            rows.push(pageview(&format!("pv_{s}_a"), &format!("s{s}"), "/", s));
            if s >= 7 {
                rows.push(pageview(&format!("pv_{s}_b"), &format!("s{s}"), "/next", s + 30));
            }
        }
        let rollup = compute_rollup(&rows, &HashMap::new(), day(0), day(0));
        assert_eq!(rollup.total_sessions, 10);
        assert_eq!(rollup.bounce_rate, 70.0);
        assert_eq!(rollup.avg_pages_per_session, 1.3);
    }

    #[test]
    fn empty_days_are_present() {
        let rows = vec![
            pageview("pv_1", "s1", "/", 0),
            pageview("pv_2", "s2", "/", 60),
            pageview("pv_3", "s2", "/", 86_400 * 2),
        ];
        let buckets = daily_buckets(&rows, day(0), day(2));
        assert_eq!(buckets.len(), 3);
        assert_eq!((buckets[0].pageviews, buckets[0].sessions), (2, 2));
        assert_eq!((buckets[1].pageviews, buckets[1].sessions), (0, 0));
        assert_eq!((buckets[2].pageviews, buckets[2].sessions), (1, 1));
    }

    #[test]
    fn attribution_uses_first_pageview() {
        let mut first = pageview("pv_1", "s1", "/", 0);
        first.referrer = Some("https://www.google.com/search?q=x".to_string());
        first.utm_source = Some("newsletter".to_string());
        first.screen_w = Some(390);
        first.screen_h = Some(844);
        let mut second = pageview("pv_2", "s1", "/b", 10);
        second.referrer = Some("https://example.com/".to_string());

        let rollup = compute_rollup(&[second, first], &HashMap::new(), day(0), day(0));
        assert_eq!(rollup.referrers[0].name, "www.google.com");
        assert_eq!(rollup.utm_sources[0].name, "newsletter");
        assert_eq!(rollup.utm_mediums[0].name, NONE_LABEL);
        assert_eq!(rollup.screens[0].name, "390x844");
        assert_eq!(rollup.browsers[0].name, "Unknown");
    }

    #[test]
    fn duration_averages_dwell_per_session() {
        let rows = vec![
            pageview("pv_1", "s1", "/", 0),
            pageview("pv_2", "s1", "/b", 10),
            pageview("pv_3", "s2", "/", 20),
        ];
        let dwell = HashMap::from([
            ("pv_1".to_string(), 1000),
            ("pv_2".to_string(), 2001),
            ("pv_3".to_string(), 0),
        ]);
        let rollup = compute_rollup(&rows, &dwell, day(0), day(0));
        assert_eq!(rollup.avg_session_duration_ms, 1501);
    }

    #[test]
    fn distributions_are_capped_and_sorted() {
        let rows: Vec<PageviewRow> = (0..15)
            .map(|i| {
                let mut pv = pageview(&format!("pv_{i}"), &format!("s{i}"), "/", i);
                pv.referrer = Some(format!("https://ref{}.example", i % 12));
                pv
            })
            .collect();
        let rollup = compute_rollup(&rows, &HashMap::new(), day(0), day(0));
        assert_eq!(rollup.referrers.len(), TOP_DISTRIBUTION_LEN);
        assert_eq!(rollup.referrers[0].count, 2);
        assert_eq!(rollup.referrers[0].name, "ref0.example");
    }

    #[test]
    fn empty_window_has_zero_rates() {
        let rollup = compute_rollup(&[], &HashMap::new(), day(0), day(6));
        assert_eq!(rollup.bounce_rate, 0.0);
        assert_eq!(rollup.daily.len(), 7);
    }
}
