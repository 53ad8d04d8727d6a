use heatlens_core::selector::RageConfig;

/// Attention zones are credited every 2 s.
pub const ZONE_SAMPLE_INTERVAL_MS: u64 = 2_000;
pub const FLUSH_INTERVAL_MS: u64 = 5_000;
/// Quiet period after the latest click before the click buffer is sent.
pub const CLICK_DEBOUNCE_MS: u64 = 1_000;
pub const POINTER_THROTTLE_MS: u64 = 100;
/// Hard cap on pointer samples captured per page load.
pub const MAX_POINTER_SAMPLES: usize = heatlens_core::event::MAX_POINTER_SAMPLES;
pub const CLICK_BUFFER_LIMIT: usize = heatlens_core::event::MAX_CLICKS_PER_BATCH;

/// Client-side timings and caps of one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Base URL of the ingestion server, e.g. `https://collect.example.com`.
    pub endpoint: String,
    pub site_key: String,
    pub zone_sample_interval_ms: u64,
    pub flush_interval_ms: u64,
    pub click_debounce_ms: u64,
    pub pointer_throttle_ms: u64,
    pub max_pointer_samples: usize,
    pub click_buffer_limit: usize,
    pub rage: RageConfig,
}

impl TrackerConfig {
    pub fn new(endpoint: impl Into<String>, site_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            site_key: site_key.into(),
            zone_sample_interval_ms: ZONE_SAMPLE_INTERVAL_MS,
            flush_interval_ms: FLUSH_INTERVAL_MS,
            click_debounce_ms: CLICK_DEBOUNCE_MS,
            pointer_throttle_ms: POINTER_THROTTLE_MS,
            max_pointer_samples: MAX_POINTER_SAMPLES,
            click_buffer_limit: CLICK_BUFFER_LIMIT,
            rage: RageConfig::default(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000", "")
    }
}
