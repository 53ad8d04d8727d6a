use anyhow::{anyhow, Result};
use duckdb::{Connection, Error};

use heatlens_core::funnel::{Funnel, FunnelDefinition, FunnelStep, MAX_FUNNELS_PER_SITE};

use crate::backend::{generate_id, row_ts};
use crate::DuckDbBackend;

fn load_funnel_steps(conn: &Connection, funnel_id: &str) -> Result<Vec<FunnelStep>> {
    let mut stmt = conn.prepare(
        "SELECT path, label FROM funnel_steps WHERE funnel_id = ?1 ORDER BY step_order ASC",
    )?;
    let rows = stmt.query_map(duckdb::params![funnel_id], |row| {
        Ok(FunnelStep {
            path: row.get(0)?,
            label: row.get(1)?,
        })
    })?;

    let mut steps = Vec::new();
    for row in rows {
        steps.push(row?);
    }
    Ok(steps)
}

fn insert_steps(conn: &Connection, funnel_id: &str, steps: &[FunnelStep]) -> Result<()> {
    for (idx, step) in steps.iter().enumerate() {
        conn.execute(
            "INSERT INTO funnel_steps (funnel_id, step_order, path, label) VALUES (?1, ?2, ?3, ?4)",
            duckdb::params![funnel_id, idx as i64, step.path, step.label],
        )?;
    }
    Ok(())
}

pub(crate) fn get_funnel_with_conn(
    conn: &Connection,
    site_id: &str,
    funnel_id: &str,
) -> Result<Option<Funnel>> {
    let row = conn
        .prepare(
            "SELECT id, site_id, name, CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR) \
             FROM funnels WHERE site_id = ?1 AND id = ?2",
        )?
        .query_row(duckdb::params![site_id, funnel_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row_ts(row.get(3)?)?,
                row_ts(row.get(4)?)?,
            ))
        });
    let (id, site_id, name, created_at, updated_at) = match row {
        Ok(row) => row,
        Err(Error::QueryReturnedNoRows) => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    let steps = load_funnel_steps(conn, &id)?;
    Ok(Some(Funnel {
        id,
        site_id,
        name,
        steps,
        created_at,
        updated_at,
    }))
}

pub async fn list_funnels_inner(db: &DuckDbBackend, site_id: &str) -> Result<Vec<Funnel>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(
        "SELECT id FROM funnels WHERE site_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(duckdb::params![site_id], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }

    let mut funnels = Vec::new();
    for id in ids {
        if let Some(funnel) = get_funnel_with_conn(&conn, site_id, &id)? {
            funnels.push(funnel);
        }
    }
    Ok(funnels)
}

pub async fn count_funnels_inner(db: &DuckDbBackend, site_id: &str) -> Result<usize> {
    let conn = db.conn.lock().await;
    let count: i64 = conn
        .prepare("SELECT COUNT(*) FROM funnels WHERE site_id = ?1")?
        .query_row(duckdb::params![site_id], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

pub async fn get_funnel_inner(
    db: &DuckDbBackend,
    site_id: &str,
    funnel_id: &str,
) -> Result<Option<Funnel>> {
    let conn = db.conn.lock().await;
    get_funnel_with_conn(&conn, site_id, funnel_id)
}

/// Insert a funnel and its steps. Fails with `limit_exceeded` once the site
/// already has the maximum number of funnels.
pub async fn create_funnel_inner(
    db: &DuckDbBackend,
    site_id: &str,
    definition: &FunnelDefinition,
) -> Result<Funnel> {
    let mut conn = db.conn.lock().await;
    let funnel_id = generate_id("fun", 21);

    let tx = conn.transaction()?;
    let count: i64 = tx
        .prepare("SELECT COUNT(*) FROM funnels WHERE site_id = ?1")?
        .query_row(duckdb::params![site_id], |row| row.get(0))?;
    if count >= MAX_FUNNELS_PER_SITE as i64 {
        return Err(anyhow!("limit_exceeded"));
    }

    tx.execute(
        "INSERT INTO funnels (id, site_id, name, created_at, updated_at) \
         VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        duckdb::params![&funnel_id, site_id, &definition.name],
    )?;
    insert_steps(&tx, &funnel_id, &definition.steps)?;
    tx.commit()?;

    get_funnel_with_conn(&conn, site_id, &funnel_id)?
        .ok_or_else(|| anyhow!("failed to load created funnel"))
}

/// Swap the name and all steps of a funnel in one transaction.
pub async fn replace_funnel_inner(
    db: &DuckDbBackend,
    site_id: &str,
    funnel_id: &str,
    definition: &FunnelDefinition,
) -> Result<Option<Funnel>> {
    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;

    let updated = tx.execute(
        "UPDATE funnels SET name = ?1, updated_at = CURRENT_TIMESTAMP \
         WHERE site_id = ?2 AND id = ?3",
        duckdb::params![&definition.name, site_id, funnel_id],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    tx.execute(
        "DELETE FROM funnel_steps WHERE funnel_id = ?1",
        duckdb::params![funnel_id],
    )?;
    insert_steps(&tx, funnel_id, &definition.steps)?;
    tx.commit()?;

    get_funnel_with_conn(&conn, site_id, funnel_id)
}

pub async fn delete_funnel_inner(db: &DuckDbBackend, site_id: &str, funnel_id: &str) -> Result<bool> {
    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;

    let exists: i64 = tx
        .prepare("SELECT COUNT(*) FROM funnels WHERE site_id = ?1 AND id = ?2")?
        .query_row(duckdb::params![site_id, funnel_id], |row| row.get(0))?;
    if exists == 0 {
        return Ok(false);
    }
    tx.execute(
        "DELETE FROM funnel_steps WHERE funnel_id = ?1",
        duckdb::params![funnel_id],
    )?;
    tx.execute(
        "DELETE FROM funnels WHERE site_id = ?1 AND id = ?2",
        duckdb::params![site_id, funnel_id],
    )?;
    tx.commit()?;
    Ok(true)
}
