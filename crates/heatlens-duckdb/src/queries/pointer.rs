use std::collections::HashMap;

use anyhow::Result;

use heatlens_core::event::{PointerBatch, PointerSample};

use crate::backend::row_ts;
use crate::DuckDbBackend;

/// Pointer batches of one pageview in insertion order, each with its samples
/// in capture order. `None` when the pageview does not exist or belongs to
/// another site.
pub async fn get_pointer_batches_inner(
    db: &DuckDbBackend,
    site_id: &str,
    pageview_id: &str,
) -> Result<Option<Vec<PointerBatch>>> {
    let conn = db.conn.lock().await;
    let owned: i64 = conn
        .prepare("SELECT COUNT(*) FROM pageviews WHERE id = ?1 AND site_id = ?2")?
        .query_row(duckdb::params![pageview_id, site_id], |row| row.get(0))?;
    if owned == 0 {
        return Ok(None);
    }

    let mut stmt = conn.prepare(
        "SELECT id, pageview_id, CAST(created_at AS VARCHAR) \
         FROM pointer_batches WHERE pageview_id = ?1 ORDER BY seq",
    )?;
    let rows = stmt.query_map(duckdb::params![pageview_id], |row| {
        Ok(PointerBatch {
            id: row.get(0)?,
            pageview_id: row.get(1)?,
            samples: Vec::new(),
            created_at: row_ts(row.get(2)?)?,
        })
    })?;
    let mut batches = Vec::new();
    for row in rows {
        batches.push(row?);
    }
    let index: HashMap<String, usize> = batches
        .iter()
        .enumerate()
        .map(|(idx, b)| (b.id.clone(), idx))
        .collect();

    let mut stmt = conn.prepare(
        "SELECT batch_id, t, x, y FROM pointer_samples \
         WHERE pageview_id = ?1 ORDER BY batch_id, ordinal",
    )?;
    let rows = stmt.query_map(duckdb::params![pageview_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            PointerSample {
                t: row.get::<_, i64>(1)?.max(0) as u64,
                x: row.get(2)?,
                y: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (batch_id, sample) = row?;
        if let Some(&idx) = index.get(&batch_id) {
            batches[idx].samples.push(sample);
        }
    }
    Ok(Some(batches))
}
