use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub account_id: String,
    pub key_prefix: String,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

/// A tracked website. `site_key` is the public token embedded in the
/// instrument snippet; `id` is the internal identifier used in query routes.
#[derive(Debug, Clone, Serialize)]
pub struct Site {
    pub id: String,
    pub site_key: String,
    pub account_id: String,
    pub domain: String,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateSiteParams {
    pub account_id: String,
    pub domain: String,
}

/// Storage interface for the site registry and API-key resolution.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    async fn lookup_api_key(&self, key_hash: &str) -> anyhow::Result<Option<ApiKeyRecord>>;
    async fn touch_api_key(&self, key_id: &str) -> anyhow::Result<()>;
    async fn create_api_key(
        &self,
        id: &str,
        account_id: &str,
        hash: &str,
        prefix: &str,
    ) -> anyhow::Result<()>;

    async fn create_site(&self, params: CreateSiteParams) -> anyhow::Result<Site>;
    async fn list_sites(&self, account_id: &str) -> anyhow::Result<Vec<Site>>;
    async fn get_site(&self, id: &str) -> anyhow::Result<Option<Site>>;
    /// Resolve the public site key an instrument sends with each pageview.
    async fn get_site_by_key(&self, site_key: &str) -> anyhow::Result<Option<Site>>;
    async fn set_site_active(&self, id: &str, active: bool) -> anyhow::Result<Option<Site>>;
    /// Delete a site and everything recorded for it.
    async fn delete_site(&self, id: &str) -> anyhow::Result<bool>;
}
