/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// Every statement uses `IF NOT EXISTS`, so re-running it on startup is safe.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `HEATLENS_DUCKDB_MEMORY`, default `"1GB"`).
///
/// No FOREIGN KEY constraints: site deletion cascades manually, children
/// first, inside one transaction (see `delete_site` in site.rs).
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- SITES
-- ===========================================
CREATE TABLE IF NOT EXISTS sites (
    id              VARCHAR PRIMARY KEY,           -- 'site_' + 10 random chars
    site_key        VARCHAR NOT NULL UNIQUE,       -- public key embedded in the snippet
    account_id      VARCHAR NOT NULL,
    domain          VARCHAR NOT NULL,
    active          BOOLEAN NOT NULL DEFAULT TRUE,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_sites_account ON sites(account_id);

-- ===========================================
-- API KEYS
-- ===========================================
CREATE TABLE IF NOT EXISTS api_keys (
    id              VARCHAR PRIMARY KEY,
    account_id      VARCHAR NOT NULL,
    key_hash        VARCHAR NOT NULL UNIQUE,       -- sha256 hex of the plaintext key
    key_prefix      VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_used_at    TIMESTAMP
);

-- ===========================================
-- PAGEVIEWS
-- ===========================================
CREATE TABLE IF NOT EXISTS pageviews (
    id              VARCHAR PRIMARY KEY,           -- 'pv_' + 16 random chars
    site_id         VARCHAR NOT NULL,
    session_id      VARCHAR NOT NULL,
    url             VARCHAR NOT NULL,
    path            VARCHAR NOT NULL,
    title           VARCHAR,
    referrer        VARCHAR,
    user_agent      VARCHAR,
    screen_w        BIGINT,
    screen_h        BIGINT,
    utm_source      VARCHAR,
    utm_medium      VARCHAR,
    utm_campaign    VARCHAR,
    page_height     BIGINT,
    created_at      TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pageviews_site_created ON pageviews(site_id, created_at);
CREATE INDEX IF NOT EXISTS idx_pageviews_site_session ON pageviews(site_id, session_id);
CREATE INDEX IF NOT EXISTS idx_pageviews_site_path    ON pageviews(site_id, path);

-- ===========================================
-- SCROLL STATE (one row per pageview, merged in place)
-- ===========================================
CREATE TABLE IF NOT EXISTS scroll_samples (
    pageview_id     VARCHAR PRIMARY KEY,
    max_depth       BIGINT NOT NULL,
    dwell_ms        BIGINT NOT NULL DEFAULT 0,
    has_zones       BOOLEAN NOT NULL DEFAULT FALSE,
    zone_0          BIGINT NOT NULL DEFAULT 0,
    zone_1          BIGINT NOT NULL DEFAULT 0,
    zone_2          BIGINT NOT NULL DEFAULT 0,
    zone_3          BIGINT NOT NULL DEFAULT 0,
    zone_4          BIGINT NOT NULL DEFAULT 0,
    zone_5          BIGINT NOT NULL DEFAULT 0,
    zone_6          BIGINT NOT NULL DEFAULT 0,
    zone_7          BIGINT NOT NULL DEFAULT 0,
    zone_8          BIGINT NOT NULL DEFAULT 0,
    zone_9          BIGINT NOT NULL DEFAULT 0,
    updated_at      TIMESTAMP NOT NULL
);

-- ===========================================
-- CLICKS
-- ===========================================
CREATE TABLE IF NOT EXISTS clicks (
    id              VARCHAR PRIMARY KEY,
    pageview_id     VARCHAR NOT NULL,
    x               BIGINT NOT NULL,
    y               BIGINT NOT NULL,
    selector        VARCHAR,
    text            VARCHAR,
    href            VARCHAR,
    is_rage         BOOLEAN NOT NULL DEFAULT FALSE,
    is_dead         BOOLEAN NOT NULL DEFAULT FALSE,
    created_at      TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_clicks_pageview ON clicks(pageview_id);

-- ===========================================
-- POINTER BATCHES (export only)
-- ===========================================
CREATE TABLE IF NOT EXISTS pointer_batches (
    id              VARCHAR PRIMARY KEY,
    pageview_id     VARCHAR NOT NULL,
    seq             BIGINT NOT NULL,               -- insertion order within the database
    sample_count    BIGINT NOT NULL,
    created_at      TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pointer_batches_pageview ON pointer_batches(pageview_id, seq);
CREATE SEQUENCE IF NOT EXISTS pointer_batch_seq START 1;

CREATE TABLE IF NOT EXISTS pointer_samples (
    batch_id        VARCHAR NOT NULL,
    pageview_id     VARCHAR NOT NULL,              -- denormalized for site cascade
    ordinal         BIGINT NOT NULL,               -- position within the batch
    t               BIGINT NOT NULL,               -- ms since page load
    x               BIGINT NOT NULL,
    y               BIGINT NOT NULL,
    PRIMARY KEY (batch_id, ordinal)
);
CREATE INDEX IF NOT EXISTS idx_pointer_samples_pageview ON pointer_samples(pageview_id);

-- ===========================================
-- FUNNELS
-- ===========================================
CREATE TABLE IF NOT EXISTS funnels (
    id              VARCHAR PRIMARY KEY,           -- 'fun_' + 21 random chars
    site_id         VARCHAR NOT NULL,
    name            VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_funnels_site ON funnels(site_id);

CREATE TABLE IF NOT EXISTS funnel_steps (
    funnel_id       VARCHAR NOT NULL,
    step_order      BIGINT NOT NULL,
    path            VARCHAR NOT NULL,
    label           VARCHAR NOT NULL,
    PRIMARY KEY (funnel_id, step_order)
);
"#
    )
}

/// Creates the `_migrations` tracking table.
pub const MIGRATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS _migrations (
    id          VARCHAR PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;
