//! Storage and query abstraction shared by the server and the DuckDB backend.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::event::{ClickRow, NewClick, NewPageview, PointerBatch, PointerSample};
use crate::funnel::{Funnel, FunnelDefinition, FunnelReport};
use crate::heatmap::{ClickIssueRow, HeatmapConfig, HeatmapResult};
use crate::rollup::{AnalyticsRollup, NamedCount};
use crate::scroll::{MergeOutcome, ScrollSample};
use crate::session::{SessionSummary, SessionTimeline};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 365;
pub const REALTIME_WINDOW_MINUTES: i64 = 5;
pub const REALTIME_TOP_PATHS: usize = 10;
pub const DEFAULT_CLICK_LOG_LIMIT: u32 = 50;
pub const MAX_CLICK_LOG_LIMIT: u32 = 200;
pub const DEFAULT_SESSION_LIST_LIMIT: u32 = 50;
pub const MAX_SESSION_LIST_LIMIT: u32 = 200;

/// Half-open query window `[since, until)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    /// The trailing `days` calendar days ending now: from UTC midnight
    /// `days - 1` days ago until `now`.
    pub fn last_days(days: Option<u32>, now: DateTime<Utc>) -> Result<Self, PayloadError> {
        let days = days.unwrap_or(DEFAULT_WINDOW_DAYS);
        if !(1..=MAX_WINDOW_DAYS).contains(&days) {
            return Err(PayloadError::Invalid {
                field: "days",
                reason: "must be between 1 and 365",
            });
        }
        let first_day = now.date_naive() - Duration::days(i64::from(days) - 1);
        let since = first_day.and_time(chrono::NaiveTime::MIN).and_utc();
        // `until` is exclusive; nudge past `now` so events stamped at `now` count.
        Ok(Self {
            since,
            until: now + Duration::milliseconds(1),
        })
    }

    pub fn first_day(&self) -> NaiveDate {
        self.since.date_naive()
    }

    pub fn last_day(&self) -> NaiveDate {
        (self.until - Duration::milliseconds(1)).date_naive()
    }
}

/// Filters for the paginated click log.
#[derive(Debug, Clone)]
pub struct ClickLogQuery {
    pub window: TimeWindow,
    pub path: Option<String>,
    pub selector_contains: Option<String>,
    pub has_href: Option<bool>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickLogPage {
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub clicks: Vec<ClickRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeResult {
    pub active_visitors: u64,
    pub window_minutes: i64,
    pub top_paths: Vec<NamedCount>,
}

/// Result of a write that references an existing pageview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested<T> {
    Stored(T),
    UnknownPageview(String),
}

#[async_trait::async_trait]
pub trait TrackingBackend: Send + Sync + 'static {
    // -- ingestion ----------------------------------------------------------

    /// Insert a pageview and return its generated id.
    async fn create_pageview(&self, pageview: &NewPageview) -> anyhow::Result<String>;

    async fn set_page_height(&self, pageview_id: &str, height: u32)
        -> anyhow::Result<Ingested<()>>;

    /// Merge a scroll sample into the stored state of `pageview_id`. The
    /// read and the conditional write happen atomically.
    async fn merge_scroll(
        &self,
        pageview_id: &str,
        sample: &ScrollSample,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Ingested<MergeOutcome>>;

    /// Store a click batch. Nothing is written when any click references an
    /// unknown pageview.
    async fn insert_clicks(&self, clicks: &[NewClick]) -> anyhow::Result<Ingested<usize>>;

    async fn insert_pointer_batch(
        &self,
        pageview_id: &str,
        samples: &[PointerSample],
        now: DateTime<Utc>,
    ) -> anyhow::Result<Ingested<String>>;

    // -- queries ------------------------------------------------------------

    async fn get_heatmap(
        &self,
        site_id: &str,
        path: &str,
        window: &TimeWindow,
        config: &HeatmapConfig,
    ) -> anyhow::Result<HeatmapResult>;

    async fn get_click_log(
        &self,
        site_id: &str,
        query: &ClickLogQuery,
    ) -> anyhow::Result<ClickLogPage>;

    async fn get_click_issues(
        &self,
        site_id: &str,
        window: &TimeWindow,
        path: Option<&str>,
        max_rows: usize,
    ) -> anyhow::Result<Vec<ClickIssueRow>>;

    async fn list_sessions(
        &self,
        site_id: &str,
        window: &TimeWindow,
        limit: u32,
        max_rows: usize,
    ) -> anyhow::Result<Vec<SessionSummary>>;

    async fn get_session_timeline(
        &self,
        site_id: &str,
        session_id: &str,
        max_rows: usize,
    ) -> anyhow::Result<Option<SessionTimeline>>;

    async fn get_rollup(
        &self,
        site_id: &str,
        window: &TimeWindow,
        max_rows: usize,
    ) -> anyhow::Result<AnalyticsRollup>;

    async fn get_realtime(&self, site_id: &str, now: DateTime<Utc>)
        -> anyhow::Result<RealtimeResult>;

    /// Pointer batches of a pageview in insertion order, `None` when the
    /// pageview does not belong to `site_id`.
    async fn get_pointer_batches(
        &self,
        site_id: &str,
        pageview_id: &str,
    ) -> anyhow::Result<Option<Vec<PointerBatch>>>;

    // -- funnels ------------------------------------------------------------

    async fn list_funnels(&self, site_id: &str) -> anyhow::Result<Vec<Funnel>>;

    async fn count_funnels(&self, site_id: &str) -> anyhow::Result<usize>;

    async fn get_funnel(&self, site_id: &str, funnel_id: &str) -> anyhow::Result<Option<Funnel>>;

    async fn create_funnel(
        &self,
        site_id: &str,
        definition: &FunnelDefinition,
    ) -> anyhow::Result<Funnel>;

    /// Swap the name and every step of an existing funnel.
    async fn replace_funnel(
        &self,
        site_id: &str,
        funnel_id: &str,
        definition: &FunnelDefinition,
    ) -> anyhow::Result<Option<Funnel>>;

    async fn delete_funnel(&self, site_id: &str, funnel_id: &str) -> anyhow::Result<bool>;

    async fn get_funnel_results(
        &self,
        site_id: &str,
        funnel_id: &str,
        window: &TimeWindow,
        max_rows: usize,
    ) -> anyhow::Result<Option<FunnelReport>>;
}
