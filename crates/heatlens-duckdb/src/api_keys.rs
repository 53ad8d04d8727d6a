use anyhow::Result;
use duckdb::Error;

use heatlens_metadata::ApiKeyRecord;

use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Look up an API key by its SHA-256 hash.
    pub async fn lookup_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>> {
        let conn = self.conn.lock().await;
        let result = conn
            .prepare(
                "SELECT id, account_id, key_prefix, \
                 CAST(created_at AS VARCHAR), \
                 CAST(last_used_at AS VARCHAR) \
                 FROM api_keys WHERE key_hash = ?1",
            )?
            .query_row(duckdb::params![key_hash], |row| {
                Ok(ApiKeyRecord {
                    id: row.get(0)?,
                    account_id: row.get(1)?,
                    key_prefix: row.get(2)?,
                    created_at: row.get(3)?,
                    last_used_at: row.get(4)?,
                })
            });
        match result {
            Ok(record) => Ok(Some(record)),
            Err(Error::QueryReturnedNoRows) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    pub async fn touch_api_key(&self, key_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE api_keys SET last_used_at = CURRENT_TIMESTAMP WHERE id = ?1",
            duckdb::params![key_id],
        )?;
        Ok(())
    }

    pub async fn create_api_key(
        &self,
        id: &str,
        account_id: &str,
        hash: &str,
        prefix: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO api_keys (id, account_id, key_hash, key_prefix, created_at) \
             VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)",
            duckdb::params![id, account_id, hash, prefix],
        )?;
        Ok(())
    }
}
