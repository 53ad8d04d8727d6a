//! Monotonic scroll-state merge.
//!
//! Scroll flushes arrive unordered, possibly duplicated, and never retried.
//! The stored state is therefore the element-wise maximum of every sample
//! ever received for a pageview, which makes the result independent of
//! arrival order and tolerant of dropped deliveries.

use serde::{Deserialize, Serialize};

use crate::event::{ZoneVector, ZONE_COUNT};

pub const MAX_DEPTH: u32 = 100;

/// One incoming scroll measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollSample {
    pub max_depth: u32,
    pub dwell_ms: Option<u64>,
    pub zones: Option<ZoneVector>,
}

/// The stored, merged scroll state of a pageview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollState {
    pub max_depth: u32,
    pub dwell_ms: u64,
    pub zones: Option<ZoneVector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No prior record existed.
    Created(ScrollState),
    /// The sample advanced at least one tracked quantity.
    Advanced(ScrollState),
    /// The stored state already dominates the sample.
    Unchanged,
}

impl ScrollState {
    fn from_sample(sample: &ScrollSample) -> Self {
        Self {
            max_depth: sample.max_depth.min(MAX_DEPTH),
            dwell_ms: sample.dwell_ms.unwrap_or(0),
            zones: sample.zones,
        }
    }

    /// True when every tracked quantity in `self` is at least `other`'s.
    pub fn dominates(&self, other: &ScrollState) -> bool {
        let zones_ok = match (&self.zones, &other.zones) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a.iter().zip(b.iter()).all(|(x, y)| x >= y),
        };
        self.max_depth >= other.max_depth && self.dwell_ms >= other.dwell_ms && zones_ok
    }
}

fn merge_zones(stored: Option<&ZoneVector>, incoming: Option<&ZoneVector>) -> Option<ZoneVector> {
    match (stored, incoming) {
        (Some(a), Some(b)) => {
            let mut merged = [0u32; ZONE_COUNT];
            for (idx, slot) in merged.iter_mut().enumerate() {
                *slot = a[idx].max(b[idx]);
            }
            Some(merged)
        }
        (Some(a), None) => Some(*a),
        (None, Some(b)) => Some(*b),
        (None, None) => None,
    }
}

/// Merge `sample` into the `stored` state of the same pageview.
pub fn merge_scroll(stored: Option<&ScrollState>, sample: &ScrollSample) -> MergeOutcome {
    let Some(stored) = stored else {
        return MergeOutcome::Created(ScrollState::from_sample(sample));
    };

    let merged = ScrollState {
        max_depth: sample.max_depth.max(stored.max_depth).min(MAX_DEPTH),
        dwell_ms: sample.dwell_ms.unwrap_or(0).max(stored.dwell_ms),
        zones: merge_zones(stored.zones.as_ref(), sample.zones.as_ref()),
    };

    if merged == *stored {
        MergeOutcome::Unchanged
    } else {
        MergeOutcome::Advanced(merged)
    }
}

/// Fold a sequence of samples from an empty state, as the store would.
pub fn fold_samples<'a>(samples: impl IntoIterator<Item = &'a ScrollSample>) -> Option<ScrollState> {
    let mut state: Option<ScrollState> = None;
    for sample in samples {
        match merge_scroll(state.as_ref(), sample) {
            MergeOutcome::Created(next) | MergeOutcome::Advanced(next) => state = Some(next),
            MergeOutcome::Unchanged => {}
        }
    }
    state
}
