use heatlens_core::event::{ClickPayload, PointerSample, ZoneVector, ZONE_COUNT};
use heatlens_core::selector::RageDetector;

use crate::config::TrackerConfig;
use crate::event::Viewport;

/// Everything the instrument remembers about one page load.
///
/// Owned by the driver and threaded through [`crate::handler::handle`]; no
/// other code touches it.
#[derive(Debug, Clone)]
pub struct InstrumentContext {
    pub config: TrackerConfig,
    pub session_id: String,
    /// `None` until the pageview call succeeds. Every handler is a no-op
    /// while this is unset.
    pub pageview_id: Option<String>,
    pub loaded_at_ms: u64,
    pub max_scroll_depth: u32,
    pub attention_zones: ZoneVector,
    /// Whether any zone sample has been taken yet.
    pub zones_sampled: bool,
    pub viewport: Option<Viewport>,
    pub clicks: Vec<ClickPayload>,
    pub click_flush_at_ms: Option<u64>,
    pub pointer: Vec<PointerSample>,
    pub pointer_total: usize,
    pub last_pointer_at_ms: Option<u64>,
    pub rage: RageDetector,
}

impl InstrumentContext {
    pub fn new(config: TrackerConfig, session_id: impl Into<String>) -> Self {
        let rage = RageDetector::new(config.rage);
        Self {
            config,
            session_id: session_id.into(),
            pageview_id: None,
            loaded_at_ms: 0,
            max_scroll_depth: 0,
            attention_zones: [0; ZONE_COUNT],
            zones_sampled: false,
            viewport: None,
            clicks: Vec::new(),
            click_flush_at_ms: None,
            pointer: Vec::new(),
            pointer_total: 0,
            last_pointer_at_ms: None,
            rage,
        }
    }

    pub fn dwell_ms(&self, at_ms: u64) -> u64 {
        at_ms.saturating_sub(self.loaded_at_ms)
    }
}
