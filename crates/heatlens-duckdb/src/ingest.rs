//! Ingestion writes. Every method takes the connection lock once, so each
//! write is serialized against every other read and write.

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use duckdb::{Connection, Error};

use heatlens_core::analytics::Ingested;
use heatlens_core::event::{NewClick, NewPageview, PointerSample, ZONE_COUNT};
use heatlens_core::scroll::{merge_scroll, MergeOutcome, ScrollSample, ScrollState};

use crate::backend::{generate_id, ts};
use crate::DuckDbBackend;

pub(crate) fn pageview_exists(conn: &Connection, pageview_id: &str) -> Result<bool> {
    let count: i64 = conn
        .prepare("SELECT COUNT(*) FROM pageviews WHERE id = ?1")?
        .query_row(duckdb::params![pageview_id], |row| row.get(0))?;
    Ok(count > 0)
}

fn load_scroll_state(conn: &Connection, pageview_id: &str) -> Result<Option<ScrollState>> {
    let result = conn
        .prepare(
            "SELECT max_depth, dwell_ms, has_zones, \
             zone_0, zone_1, zone_2, zone_3, zone_4, zone_5, zone_6, zone_7, zone_8, zone_9 \
             FROM scroll_samples WHERE pageview_id = ?1",
        )?
        .query_row(duckdb::params![pageview_id], |row| {
            let has_zones: bool = row.get(2)?;
            let mut zones = [0u32; ZONE_COUNT];
            for (idx, slot) in zones.iter_mut().enumerate() {
                *slot = row.get::<_, i64>(3 + idx)?.max(0) as u32;
            }
            Ok(ScrollState {
                max_depth: row.get::<_, i64>(0)?.max(0) as u32,
                dwell_ms: row.get::<_, i64>(1)?.max(0) as u64,
                zones: has_zones.then_some(zones),
            })
        });
    match result {
        Ok(state) => Ok(Some(state)),
        Err(Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn zone_params(state: &ScrollState) -> [i64; ZONE_COUNT] {
    let mut out = [0i64; ZONE_COUNT];
    if let Some(zones) = &state.zones {
        for (slot, value) in out.iter_mut().zip(zones.iter()) {
            *slot = i64::from(*value);
        }
    }
    out
}

impl DuckDbBackend {
    pub async fn create_pageview(&self, pageview: &NewPageview) -> Result<String> {
        let conn = self.conn.lock().await;
        let id = generate_id("pv", 16);
        conn.execute(
            r#"INSERT INTO pageviews (
                id, site_id, session_id, url, path, title, referrer, user_agent,
                screen_w, screen_h, utm_source, utm_medium, utm_campaign,
                page_height, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13,
                NULL, ?14
            )"#,
            duckdb::params![
                id,
                pageview.site_id,
                pageview.session_id,
                pageview.url,
                pageview.path,
                pageview.title,
                pageview.referrer,
                pageview.user_agent,
                pageview.screen_w.map(i64::from),
                pageview.screen_h.map(i64::from),
                pageview.utm_source,
                pageview.utm_medium,
                pageview.utm_campaign,
                ts(pageview.created_at),
            ],
        )?;
        Ok(id)
    }

    pub async fn set_page_height(&self, pageview_id: &str, height: u32) -> Result<Ingested<()>> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE pageviews SET page_height = ?1 WHERE id = ?2",
            duckdb::params![i64::from(height), pageview_id],
        )?;
        if updated == 0 {
            return Ok(Ingested::UnknownPageview(pageview_id.to_string()));
        }
        Ok(Ingested::Stored(()))
    }

    /// Read the stored scroll state, merge, and write back only when the
    /// sample advanced something. Runs inside one transaction while the
    /// connection lock is held, so concurrent flushes for the same pageview
    /// cannot lose an update.
    pub async fn merge_scroll(
        &self,
        pageview_id: &str,
        sample: &ScrollSample,
        now: DateTime<Utc>,
    ) -> Result<Ingested<MergeOutcome>> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        if !pageview_exists(&tx, pageview_id)? {
            return Ok(Ingested::UnknownPageview(pageview_id.to_string()));
        }

        let stored = load_scroll_state(&tx, pageview_id)?;
        let outcome = merge_scroll(stored.as_ref(), sample);
        match &outcome {
            MergeOutcome::Created(state) => {
                let z = zone_params(state);
                tx.execute(
                    r#"INSERT INTO scroll_samples (
                        pageview_id, max_depth, dwell_ms, has_zones,
                        zone_0, zone_1, zone_2, zone_3, zone_4,
                        zone_5, zone_6, zone_7, zone_8, zone_9, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"#,
                    duckdb::params![
                        pageview_id,
                        i64::from(state.max_depth),
                        state.dwell_ms as i64,
                        state.zones.is_some(),
                        z[0], z[1], z[2], z[3], z[4], z[5], z[6], z[7], z[8], z[9],
                        ts(now),
                    ],
                )?;
            }
            MergeOutcome::Advanced(state) => {
                let z = zone_params(state);
                tx.execute(
                    r#"UPDATE scroll_samples SET
                        max_depth = ?1, dwell_ms = ?2, has_zones = ?3,
                        zone_0 = ?4, zone_1 = ?5, zone_2 = ?6, zone_3 = ?7, zone_4 = ?8,
                        zone_5 = ?9, zone_6 = ?10, zone_7 = ?11, zone_8 = ?12, zone_9 = ?13,
                        updated_at = ?14
                    WHERE pageview_id = ?15"#,
                    duckdb::params![
                        i64::from(state.max_depth),
                        state.dwell_ms as i64,
                        state.zones.is_some(),
                        z[0], z[1], z[2], z[3], z[4], z[5], z[6], z[7], z[8], z[9],
                        ts(now),
                        pageview_id,
                    ],
                )?;
            }
            MergeOutcome::Unchanged => {}
        }

        tx.commit()?;
        Ok(Ingested::Stored(outcome))
    }

    /// Insert a click batch in one transaction. Every referenced pageview is
    /// checked first; one unknown id rejects the whole batch.
    pub async fn insert_clicks(&self, clicks: &[NewClick]) -> Result<Ingested<usize>> {
        if clicks.is_empty() {
            return Ok(Ingested::Stored(0));
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let referenced: BTreeSet<&str> = clicks.iter().map(|c| c.pageview_id.as_str()).collect();
        for pageview_id in referenced {
            if !pageview_exists(&tx, pageview_id)? {
                return Ok(Ingested::UnknownPageview(pageview_id.to_string()));
            }
        }

        for click in clicks {
            tx.execute(
                r#"INSERT INTO clicks (
                    id, pageview_id, x, y, selector, text, href, is_rage, is_dead, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
                duckdb::params![
                    uuid::Uuid::new_v4().to_string(),
                    click.pageview_id,
                    click.x,
                    click.y,
                    click.selector,
                    click.text,
                    click.href,
                    click.is_rage,
                    click.is_dead,
                    ts(click.created_at),
                ],
            )?;
        }

        tx.commit()?;
        tracing::debug!(count = clicks.len(), "inserted click batch");
        Ok(Ingested::Stored(clicks.len()))
    }

    pub async fn insert_pointer_batch(
        &self,
        pageview_id: &str,
        samples: &[PointerSample],
        now: DateTime<Utc>,
    ) -> Result<Ingested<String>> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !pageview_exists(&tx, pageview_id)? {
            return Ok(Ingested::UnknownPageview(pageview_id.to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        tx.execute(
            r#"INSERT INTO pointer_batches (id, pageview_id, seq, sample_count, created_at)
               VALUES (?1, ?2, nextval('pointer_batch_seq'), ?3, ?4)"#,
            duckdb::params![id, pageview_id, samples.len() as i64, ts(now)],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO pointer_samples (batch_id, pageview_id, ordinal, t, x, y) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (ordinal, sample) in samples.iter().enumerate() {
                stmt.execute(duckdb::params![
                    id,
                    pageview_id,
                    ordinal as i64,
                    i64::try_from(sample.t).unwrap_or(i64::MAX),
                    sample.x,
                    sample.y,
                ])?;
            }
        }
        tx.commit()?;
        Ok(Ingested::Stored(id))
    }
}
