//! Inputs to the instrument. Every event carries `at_ms`, milliseconds on
//! the page clock since the page started loading.

use heatlens_core::selector::ClickTarget;

/// Scroll geometry of the document at one instant, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub scroll_y: u32,
    pub viewport_h: u32,
    pub document_h: u32,
}

impl Viewport {
    /// Percentage of the document seen so far, 0..=100.
    pub fn depth_percent(&self) -> u32 {
        if self.document_h == 0 {
            return 0;
        }
        let bottom = u64::from(self.scroll_y) + u64::from(self.viewport_h);
        let pct = (bottom as f64 / f64::from(self.document_h) * 100.0).round();
        pct.clamp(0.0, 100.0) as u32
    }

    /// True when the band `[top, bottom)` overlaps the visible area.
    pub fn intersects(&self, top: f64, bottom: f64) -> bool {
        let visible_top = f64::from(self.scroll_y);
        let visible_bottom = visible_top + f64::from(self.viewport_h);
        top < visible_bottom && bottom > visible_top
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    ZoneSample,
    PeriodicFlush,
    ClickDebounce,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// The pageview call returned an id. `viewport` is the geometry at
    /// load, before any scroll.
    PageviewLoaded {
        pageview_id: String,
        at_ms: u64,
        viewport: Viewport,
    },
    ScrollTick {
        viewport: Viewport,
        at_ms: u64,
    },
    ClickObserved {
        x: i64,
        y: i64,
        target: ClickTarget,
        text: Option<String>,
        at_ms: u64,
    },
    PointerSampled {
        x: i64,
        y: i64,
        at_ms: u64,
    },
    PageHidden {
        at_ms: u64,
    },
    TimerFired {
        timer: Timer,
        at_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_is_bottom_edge_over_document_height() {
        let vp = Viewport {
            scroll_y: 600,
            viewport_h: 800,
            document_h: 2000,
        };
        assert_eq!(vp.depth_percent(), 70);

        let past_end = Viewport {
            scroll_y: 1900,
            viewport_h: 800,
            document_h: 2000,
        };
        assert_eq!(past_end.depth_percent(), 100);
    }

    #[test]
    fn empty_document_has_zero_depth() {
        let vp = Viewport {
            scroll_y: 0,
            viewport_h: 800,
            document_h: 0,
        };
        assert_eq!(vp.depth_percent(), 0);
    }
}
