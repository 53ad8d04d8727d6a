use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::error;

use heatlens_core::{analytics::TrackingBackend, config::Config};
use heatlens_duckdb::DuckDbBackend;

use crate::metadata::{duckdb::DuckDbMetadataStore, MetadataStore};

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Site key to site id, stamped with an invalidation generation.
///
/// A lookup may only fill the cache if no invalidation happened between its
/// start and its insert; otherwise a read that raced a deactivation could
/// re-cache a site that is no longer active.
#[derive(Default)]
struct SiteKeyCache {
    entries: HashMap<String, String>,
    generation: u64,
}

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// Kept for the liveness probe and test fixtures; handlers go through
    /// `analytics` and `metadata`.
    pub db: Arc<DuckDbBackend>,

    pub analytics: Arc<dyn TrackingBackend>,

    pub metadata: Arc<dyn MetadataStore>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Active site keys resolved to their site id.
    ///
    /// Populated lazily by the pageview endpoint. Entries are dropped when a
    /// site is deactivated or deleted so the next pageview is re-checked.
    site_key_cache: Arc<RwLock<SiteKeyCache>>,

    /// Per-IP sliding-window rate limiter for the ingestion endpoints.
    ///
    /// Key: client IP. Value: request timestamps within the last 60 seconds.
    rate_limiter: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl AppState {
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        Self {
            analytics: db.clone(),
            metadata: Arc::new(DuckDbMetadataStore::new(db.clone())),
            db,
            config: Arc::new(config),
            site_key_cache: Arc::new(RwLock::new(SiteKeyCache::default())),
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check whether `ip` is within the ingestion rate limit.
    ///
    /// Returns `true` if the request should proceed, `false` if it should be
    /// rejected with 429. Slides the window on every call.
    pub async fn check_rate_limit(&self, ip: &str) -> bool {
        if self.config.rate_limit_disabled {
            return true;
        }
        let max = self.config.ingest_rate_limit;
        let now = Instant::now();
        let mut map = self.rate_limiter.lock().await;
        let window = map.entry(ip.to_string()).or_default();
        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= RATE_LIMIT_WINDOW)
        {
            window.pop_front();
        }
        if window.len() >= max {
            return false;
        }
        window.push_back(now);
        true
    }

    /// Resolve a public site key to the id of an active site.
    ///
    /// Checks the in-process cache first; on a miss falls back to the
    /// metadata store and caches active sites only, unless an invalidation
    /// landed while the store was being read.
    pub async fn resolve_site_key(&self, site_key: &str) -> Option<String> {
        let seen = {
            let cache = self.site_key_cache.read().await;
            if let Some(site_id) = cache.entries.get(site_key) {
                return Some(site_id.clone());
            }
            cache.generation
        };

        match self.metadata.get_site_by_key(site_key).await {
            Ok(Some(site)) if site.active => {
                let mut cache = self.site_key_cache.write().await;
                if cache.generation == seen {
                    cache.entries.insert(site_key.to_string(), site.id.clone());
                }
                Some(site.id)
            }
            Ok(_) => None,
            Err(e) => {
                error!(error = %e, "site key lookup failed");
                None
            }
        }
    }

    /// Forget every cached key that resolves to `site_id`.
    pub async fn invalidate_site(&self, site_id: &str) {
        let mut cache = self.site_key_cache.write().await;
        cache.entries.retain(|_, cached| cached != site_id);
        cache.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use heatlens_core::heatmap::HeatmapConfig;
    use tokio::sync::Notify;

    use super::*;
    use crate::metadata::{ApiKeyRecord, CreateSiteParams, Site};

    fn test_config() -> Config {
        Config {
            port: 0,
            data_dir: "/tmp/heatlens-test".to_string(),
            duckdb_memory_limit: "1GB".to_string(),
            rate_limit_disabled: true,
            ingest_rate_limit: 600,
            heatmap: HeatmapConfig::default(),
        }
    }

    /// Delegates to the DuckDB store, but parks every site-key lookup after
    /// it has read the row until the test releases it.
    struct GatedStore {
        inner: DuckDbMetadataStore,
        read_done: Notify,
        release: Notify,
    }

    #[async_trait]
    impl MetadataStore for GatedStore {
        async fn lookup_api_key(&self, key_hash: &str) -> anyhow::Result<Option<ApiKeyRecord>> {
            self.inner.lookup_api_key(key_hash).await
        }

        async fn touch_api_key(&self, key_id: &str) -> anyhow::Result<()> {
            self.inner.touch_api_key(key_id).await
        }

        async fn create_api_key(
            &self,
            id: &str,
            account_id: &str,
            hash: &str,
            prefix: &str,
        ) -> anyhow::Result<()> {
            self.inner.create_api_key(id, account_id, hash, prefix).await
        }

        async fn create_site(&self, params: CreateSiteParams) -> anyhow::Result<Site> {
            self.inner.create_site(params).await
        }

        async fn list_sites(&self, account_id: &str) -> anyhow::Result<Vec<Site>> {
            self.inner.list_sites(account_id).await
        }

        async fn get_site(&self, id: &str) -> anyhow::Result<Option<Site>> {
            self.inner.get_site(id).await
        }

        async fn get_site_by_key(&self, site_key: &str) -> anyhow::Result<Option<Site>> {
            let site = self.inner.get_site_by_key(site_key).await;
            self.read_done.notify_one();
            self.release.notified().await;
            site
        }

        async fn set_site_active(&self, id: &str, active: bool) -> anyhow::Result<Option<Site>> {
            self.inner.set_site_active(id, active).await
        }

        async fn delete_site(&self, id: &str) -> anyhow::Result<bool> {
            self.inner.delete_site(id).await
        }
    }

    async fn gated_state() -> (Arc<AppState>, Arc<GatedStore>, Site) {
        let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
        let mut state = AppState::new(db, test_config());
        let store = Arc::new(GatedStore {
            inner: DuckDbMetadataStore::new(state.db.clone()),
            read_done: Notify::new(),
            release: Notify::new(),
        });
        let site = store
            .create_site(CreateSiteParams {
                account_id: "acct_1".to_string(),
                domain: "example.com".to_string(),
            })
            .await
            .expect("site");
        state.metadata = Arc::clone(&store) as Arc<dyn MetadataStore>;
        (Arc::new(state), store, site)
    }

    #[tokio::test]
    async fn deactivation_during_lookup_is_not_cached() {
        let (state, store, site) = gated_state().await;

        let resolving = {
            let state = Arc::clone(&state);
            let key = site.site_key.clone();
            tokio::spawn(async move { state.resolve_site_key(&key).await })
        };

        // The lookup has read the site as active; deactivate it before the
        // lookup gets to write the cache.
        store.read_done.notified().await;
        store
            .set_site_active(&site.id, false)
            .await
            .expect("deactivate");
        state.invalidate_site(&site.id).await;
        store.release.notify_one();

        // The in-flight request may still see the stale answer.
        assert_eq!(resolving.await.expect("join"), Some(site.id.clone()));
        assert!(state.site_key_cache.read().await.entries.is_empty());

        // The next request goes back to the store and is refused.
        let next = {
            let state = Arc::clone(&state);
            let key = site.site_key.clone();
            tokio::spawn(async move { state.resolve_site_key(&key).await })
        };
        store.read_done.notified().await;
        store.release.notify_one();
        assert_eq!(next.await.expect("join"), None);
    }

    #[tokio::test]
    async fn undisturbed_lookup_is_cached() {
        let (state, store, site) = gated_state().await;
        let resolving = {
            let state = Arc::clone(&state);
            let key = site.site_key.clone();
            tokio::spawn(async move { state.resolve_site_key(&key).await })
        };
        store.read_done.notified().await;
        store.release.notify_one();
        assert_eq!(resolving.await.expect("join"), Some(site.id.clone()));

        // Served from the cache: the gated store is not consulted again.
        assert_eq!(state.resolve_site_key(&site.site_key).await, Some(site.id));
    }
}
