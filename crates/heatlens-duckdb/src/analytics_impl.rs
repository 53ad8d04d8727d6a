use async_trait::async_trait;
use chrono::{DateTime, Utc};

use heatlens_core::analytics::{
    ClickLogPage, ClickLogQuery, Ingested, RealtimeResult, TimeWindow, TrackingBackend,
};
use heatlens_core::event::{NewClick, NewPageview, PointerBatch, PointerSample};
use heatlens_core::funnel::{Funnel, FunnelDefinition, FunnelReport};
use heatlens_core::heatmap::{ClickIssueRow, HeatmapConfig, HeatmapResult};
use heatlens_core::rollup::AnalyticsRollup;
use heatlens_core::scroll::{MergeOutcome, ScrollSample};
use heatlens_core::session::{SessionSummary, SessionTimeline};

use crate::queries;
use crate::DuckDbBackend;

#[async_trait]
impl TrackingBackend for DuckDbBackend {
    async fn create_pageview(&self, pageview: &NewPageview) -> anyhow::Result<String> {
        DuckDbBackend::create_pageview(self, pageview).await
    }

    async fn set_page_height(
        &self,
        pageview_id: &str,
        height: u32,
    ) -> anyhow::Result<Ingested<()>> {
        DuckDbBackend::set_page_height(self, pageview_id, height).await
    }

    async fn merge_scroll(
        &self,
        pageview_id: &str,
        sample: &ScrollSample,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Ingested<MergeOutcome>> {
        DuckDbBackend::merge_scroll(self, pageview_id, sample, now).await
    }

    async fn insert_clicks(&self, clicks: &[NewClick]) -> anyhow::Result<Ingested<usize>> {
        DuckDbBackend::insert_clicks(self, clicks).await
    }

    async fn insert_pointer_batch(
        &self,
        pageview_id: &str,
        samples: &[PointerSample],
        now: DateTime<Utc>,
    ) -> anyhow::Result<Ingested<String>> {
        DuckDbBackend::insert_pointer_batch(self, pageview_id, samples, now).await
    }

    async fn get_heatmap(
        &self,
        site_id: &str,
        path: &str,
        window: &TimeWindow,
        config: &HeatmapConfig,
    ) -> anyhow::Result<HeatmapResult> {
        queries::heatmap::get_heatmap_inner(self, site_id, path, window, config).await
    }

    async fn get_click_log(
        &self,
        site_id: &str,
        query: &ClickLogQuery,
    ) -> anyhow::Result<ClickLogPage> {
        queries::clicks::get_click_log_inner(self, site_id, query).await
    }

    async fn get_click_issues(
        &self,
        site_id: &str,
        window: &TimeWindow,
        path: Option<&str>,
        max_rows: usize,
    ) -> anyhow::Result<Vec<ClickIssueRow>> {
        queries::clicks::get_click_issues_inner(self, site_id, window, path, max_rows).await
    }

    async fn list_sessions(
        &self,
        site_id: &str,
        window: &TimeWindow,
        limit: u32,
        max_rows: usize,
    ) -> anyhow::Result<Vec<SessionSummary>> {
        queries::sessions::list_sessions_inner(self, site_id, window, limit, max_rows).await
    }

    async fn get_session_timeline(
        &self,
        site_id: &str,
        session_id: &str,
        max_rows: usize,
    ) -> anyhow::Result<Option<SessionTimeline>> {
        queries::sessions::get_session_timeline_inner(self, site_id, session_id, max_rows).await
    }

    async fn get_rollup(
        &self,
        site_id: &str,
        window: &TimeWindow,
        max_rows: usize,
    ) -> anyhow::Result<AnalyticsRollup> {
        queries::rollup::get_rollup_inner(self, site_id, window, max_rows).await
    }

    async fn get_realtime(
        &self,
        site_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<RealtimeResult> {
        queries::realtime::get_realtime_inner(self, site_id, now).await
    }

    async fn get_pointer_batches(
        &self,
        site_id: &str,
        pageview_id: &str,
    ) -> anyhow::Result<Option<Vec<PointerBatch>>> {
        queries::pointer::get_pointer_batches_inner(self, site_id, pageview_id).await
    }

    async fn list_funnels(&self, site_id: &str) -> anyhow::Result<Vec<Funnel>> {
        queries::funnels::list_funnels_inner(self, site_id).await
    }

    async fn count_funnels(&self, site_id: &str) -> anyhow::Result<usize> {
        queries::funnels::count_funnels_inner(self, site_id).await
    }

    async fn get_funnel(&self, site_id: &str, funnel_id: &str) -> anyhow::Result<Option<Funnel>> {
        queries::funnels::get_funnel_inner(self, site_id, funnel_id).await
    }

    async fn create_funnel(
        &self,
        site_id: &str,
        definition: &FunnelDefinition,
    ) -> anyhow::Result<Funnel> {
        queries::funnels::create_funnel_inner(self, site_id, definition).await
    }

    async fn replace_funnel(
        &self,
        site_id: &str,
        funnel_id: &str,
        definition: &FunnelDefinition,
    ) -> anyhow::Result<Option<Funnel>> {
        queries::funnels::replace_funnel_inner(self, site_id, funnel_id, definition).await
    }

    async fn delete_funnel(&self, site_id: &str, funnel_id: &str) -> anyhow::Result<bool> {
        queries::funnels::delete_funnel_inner(self, site_id, funnel_id).await
    }

    async fn get_funnel_results(
        &self,
        site_id: &str,
        funnel_id: &str,
        window: &TimeWindow,
        max_rows: usize,
    ) -> anyhow::Result<Option<FunnelReport>> {
        queries::funnel_results::get_funnel_results_inner(
            self, site_id, funnel_id, window, max_rows,
        )
        .await
    }
}
