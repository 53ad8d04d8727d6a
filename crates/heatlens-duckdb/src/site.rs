use anyhow::Result;
use duckdb::Error;

use heatlens_metadata::{CreateSiteParams, Site};

use crate::backend::generate_id;
use crate::DuckDbBackend;

const SITE_COLUMNS: &str = "id, site_key, account_id, domain, active, CAST(created_at AS VARCHAR)";

fn map_site(row: &duckdb::Row<'_>) -> duckdb::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        site_key: row.get(1)?,
        account_id: row.get(2)?,
        domain: row.get(3)?,
        active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn get_site_where(conn: &duckdb::Connection, column: &str, value: &str) -> Result<Option<Site>> {
    let sql = format!("SELECT {SITE_COLUMNS} FROM sites WHERE {column} = ?1");
    match conn.prepare(&sql)?.query_row(duckdb::params![value], map_site) {
        Ok(site) => Ok(Some(site)),
        Err(Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

impl DuckDbBackend {
    pub async fn create_site(&self, params: CreateSiteParams) -> Result<Site> {
        let conn = self.conn.lock().await;
        let id = generate_id("site", 10);
        let site_key = generate_id("hl", 24);

        conn.execute(
            "INSERT INTO sites (id, site_key, account_id, domain, active, created_at) \
             VALUES (?1, ?2, ?3, ?4, TRUE, CURRENT_TIMESTAMP)",
            duckdb::params![id, site_key, params.account_id, params.domain],
        )?;

        get_site_where(&conn, "id", &id)?
            .ok_or_else(|| anyhow::anyhow!("failed to load created site"))
    }

    pub async fn list_sites(&self, account_id: &str) -> Result<Vec<Site>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {SITE_COLUMNS} FROM sites WHERE account_id = ?1 ORDER BY created_at, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![account_id], map_site)?;

        let mut sites = Vec::new();
        for row in rows {
            sites.push(row?);
        }
        Ok(sites)
    }

    pub async fn get_site(&self, id: &str) -> Result<Option<Site>> {
        let conn = self.conn.lock().await;
        get_site_where(&conn, "id", id)
    }

    pub async fn get_site_by_key(&self, site_key: &str) -> Result<Option<Site>> {
        let conn = self.conn.lock().await;
        get_site_where(&conn, "site_key", site_key)
    }

    pub async fn set_site_active(&self, id: &str, active: bool) -> Result<Option<Site>> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE sites SET active = ?1 WHERE id = ?2",
            duckdb::params![active, id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        get_site_where(&conn, "id", id)
    }

    /// Delete a site and everything recorded for it.
    ///
    /// There are no foreign keys, so children go first, all inside one
    /// transaction: clicks, scroll state and pointer data via their
    /// pageviews, then pageviews, funnel steps, funnels and the site row.
    pub async fn delete_site(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let exists: i64 = tx
            .prepare("SELECT COUNT(*) FROM sites WHERE id = ?1")?
            .query_row(duckdb::params![id], |row| row.get(0))?;
        if exists == 0 {
            return Ok(false);
        }

        for child in ["clicks", "scroll_samples", "pointer_samples", "pointer_batches"] {
            let sql = format!(
                "DELETE FROM {child} WHERE pageview_id IN \
                 (SELECT id FROM pageviews WHERE site_id = ?1)"
            );
            tx.execute(&sql, duckdb::params![id])?;
        }
        tx.execute("DELETE FROM pageviews WHERE site_id = ?1", duckdb::params![id])?;
        tx.execute(
            "DELETE FROM funnel_steps WHERE funnel_id IN \
             (SELECT id FROM funnels WHERE site_id = ?1)",
            duckdb::params![id],
        )?;
        tx.execute("DELETE FROM funnels WHERE site_id = ?1", duckdb::params![id])?;
        tx.execute("DELETE FROM sites WHERE id = ?1", duckdb::params![id])?;

        tx.commit()?;
        tracing::info!(site_id = %id, "site deleted");
        Ok(true)
    }
}
