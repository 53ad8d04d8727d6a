use std::sync::Arc;

use async_trait::async_trait;

use heatlens_duckdb::DuckDbBackend;

use super::{ApiKeyRecord, CreateSiteParams, MetadataStore, Site};

pub struct DuckDbMetadataStore {
    db: Arc<DuckDbBackend>,
}

impl DuckDbMetadataStore {
    pub fn new(db: Arc<DuckDbBackend>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataStore for DuckDbMetadataStore {
    async fn lookup_api_key(&self, key_hash: &str) -> anyhow::Result<Option<ApiKeyRecord>> {
        self.db.lookup_api_key(key_hash).await
    }

    async fn touch_api_key(&self, key_id: &str) -> anyhow::Result<()> {
        self.db.touch_api_key(key_id).await
    }

    async fn create_api_key(
        &self,
        id: &str,
        account_id: &str,
        hash: &str,
        prefix: &str,
    ) -> anyhow::Result<()> {
        self.db.create_api_key(id, account_id, hash, prefix).await
    }

    async fn create_site(&self, params: CreateSiteParams) -> anyhow::Result<Site> {
        self.db.create_site(params).await
    }

    async fn list_sites(&self, account_id: &str) -> anyhow::Result<Vec<Site>> {
        self.db.list_sites(account_id).await
    }

    async fn get_site(&self, id: &str) -> anyhow::Result<Option<Site>> {
        self.db.get_site(id).await
    }

    async fn get_site_by_key(&self, site_key: &str) -> anyhow::Result<Option<Site>> {
        self.db.get_site_by_key(site_key).await
    }

    async fn set_site_active(&self, id: &str, active: bool) -> anyhow::Result<Option<Site>> {
        self.db.set_site_active(id, active).await
    }

    async fn delete_site(&self, id: &str) -> anyhow::Result<bool> {
        self.db.delete_site(id).await
    }
}
