//! Selector derivation and the capture-time rage/dead click classifier.
//!
//! The instrument labels clicks with [`selector_path`] and the server later
//! groups stored clicks by the same string, so both sides must share this
//! module.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::event::truncate;

pub const MAX_SELECTOR_LEN: usize = 200;
pub const DEFAULT_RAGE_WINDOW_MS: u64 = 2000;
pub const DEFAULT_RAGE_THRESHOLD: usize = 3;

const INTERACTIVE_TAGS: &[&str] = &[
    "a", "button", "input", "select", "textarea", "option", "label", "summary", "details",
];
const INTERACTIVE_ROLES: &[&str] = &["button", "link", "checkbox", "menuitem", "tab"];

/// Derive the grouping selector for an element: `tag`, then `#id` when the
/// element has one, otherwise up to two class tokens.
pub fn selector_path<S: AsRef<str>>(tag: &str, id: Option<&str>, classes: &[S]) -> String {
    let mut selector = tag.trim().to_ascii_lowercase();
    match id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            selector.push('#');
            selector.push_str(id);
        }
        None => {
            for class in classes
                .iter()
                .map(|c| c.as_ref().trim())
                .filter(|c| !c.is_empty())
                .take(2)
            {
                selector.push('.');
                selector.push_str(class);
            }
        }
    }
    truncate(&selector, MAX_SELECTOR_LEN)
}

/// The subset of a DOM element the classifier needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub role: Option<String>,
    pub tabindex: Option<i32>,
    /// Inline `onclick` attribute or a listener bound by the host page.
    pub has_click_handler: bool,
    pub href: Option<String>,
}

impl ElementSnapshot {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn selector(&self) -> String {
        selector_path(&self.tag, self.id.as_deref(), &self.classes)
    }

    pub fn is_interactive(&self) -> bool {
        let tag = self.tag.to_ascii_lowercase();
        if INTERACTIVE_TAGS.contains(&tag.as_str()) {
            return true;
        }
        if self
            .role
            .as_deref()
            .is_some_and(|role| INTERACTIVE_ROLES.contains(&role.to_ascii_lowercase().as_str()))
        {
            return true;
        }
        self.tabindex.is_some() || self.has_click_handler
    }

    fn link_target(&self) -> Option<&str> {
        self.href
            .as_deref()
            .map(str::trim)
            .filter(|href| !href.is_empty() && *href != "#")
    }
}

/// A clicked element plus its ancestors, nearest first, stopping before `body`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickTarget {
    pub element: ElementSnapshot,
    pub ancestors: Vec<ElementSnapshot>,
}

impl ClickTarget {
    pub fn selector(&self) -> String {
        self.element.selector()
    }

    /// Nearest link target on the element or any ancestor.
    pub fn resolved_href(&self) -> Option<&str> {
        std::iter::once(&self.element)
            .chain(self.ancestors.iter())
            .find_map(ElementSnapshot::link_target)
    }

    /// A click is dead when nothing in the chain is interactive and no link
    /// target resolves.
    pub fn is_dead(&self) -> bool {
        let interactive = std::iter::once(&self.element)
            .chain(self.ancestors.iter())
            .any(ElementSnapshot::is_interactive);
        !interactive && self.resolved_href().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RageConfig {
    pub window_ms: u64,
    pub threshold: usize,
}

impl Default for RageConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_RAGE_WINDOW_MS,
            threshold: DEFAULT_RAGE_THRESHOLD,
        }
    }
}

/// Rolling per-page-load click history used only for rage detection.
#[derive(Debug, Clone, Default)]
pub struct RageDetector {
    config: RageConfig,
    history: VecDeque<(String, u64)>,
}

impl RageDetector {
    pub fn new(config: RageConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
        }
    }

    /// Record a click at `at_ms` and report whether its selector has now been
    /// clicked `threshold` or more times within the trailing window.
    pub fn observe(&mut self, selector: &str, at_ms: u64) -> bool {
        let window = self.config.window_ms;
        while self
            .history
            .front()
            .is_some_and(|(_, t)| at_ms.saturating_sub(*t) >= window)
        {
            self.history.pop_front();
        }
        self.history.push_back((selector.to_string(), at_ms));
        let hits = self.history.iter().filter(|(s, _)| s == selector).count();
        hits >= self.config.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickClassification {
    pub is_rage: bool,
    pub is_dead: bool,
}

/// Label a click at capture time. The two flags are independent.
pub fn classify_click(
    detector: &mut RageDetector,
    target: &ClickTarget,
    at_ms: u64,
) -> ClickClassification {
    let selector = target.selector();
    ClickClassification {
        is_rage: detector.observe(&selector, at_ms),
        is_dead: target.is_dead(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn div(classes: &[&str]) -> ElementSnapshot {
        ElementSnapshot {
            tag: "DIV".to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            ..ElementSnapshot::default()
        }
    }

    #[test]
    fn selector_prefers_id_over_classes() {
        assert_eq!(selector_path("BUTTON", Some("buy"), &["btn", "primary"]), "button#buy");
        assert_eq!(
            selector_path("div", None, &["card", "", "hero", "wide"]),
            "div.card.hero"
        );
        assert_eq!(selector_path::<&str>("span", Some("  "), &[]), "span");
    }

    #[test]
    fn selector_is_truncated() {
        let long = "x".repeat(400);
        assert_eq!(selector_path("div", Some(&long), &[] as &[&str]).len(), MAX_SELECTOR_LEN);
    }

    #[test]
    fn plain_div_is_dead() {
        let target = ClickTarget {
            element: div(&["hero"]),
            ancestors: vec![div(&["wrapper"])],
        };
        assert!(target.is_dead());
    }

    #[test]
    fn interactive_ancestor_rescues_click() {
        let target = ClickTarget {
            element: ElementSnapshot::new("span"),
            ancestors: vec![ElementSnapshot::new("button")],
        };
        assert!(!target.is_dead());
    }

    #[test]
    fn role_tabindex_and_handlers_are_interactive() {
        let mut role = div(&[]);
        role.role = Some("Button".to_string());
        assert!(role.is_interactive());

        let mut tab = div(&[]);
        tab.tabindex = Some(-1);
        assert!(tab.is_interactive());

        let mut handler = div(&[]);
        handler.has_click_handler = true;
        assert!(handler.is_interactive());
    }

    #[test]
    fn hash_only_href_does_not_resolve() {
        let mut el = ElementSnapshot::new("span");
        el.href = Some("#".to_string());
        let target = ClickTarget {
            element: el,
            ancestors: vec![],
        };
        assert_eq!(target.resolved_href(), None);
        assert!(target.is_dead());
    }

    #[test]
    fn third_click_in_window_is_rage() {
        let mut detector = RageDetector::new(RageConfig::default());
        assert!(!detector.observe("div.hero", 0));
        assert!(!detector.observe("div.hero", 500));
        assert!(detector.observe("div.hero", 900));
        assert!(detector.observe("div.hero", 1200));
    }

    #[test]
    fn clicks_outside_window_reset_the_count() {
        let mut detector = RageDetector::new(RageConfig::default());
        assert!(!detector.observe("div.hero", 0));
        assert!(!detector.observe("div.hero", 100));
        // The first two clicks have aged out.
        assert!(!detector.observe("div.hero", 2500));
        assert!(!detector.observe("div.hero", 2600));
        assert!(detector.observe("div.hero", 2700));
    }

    #[test]
    fn different_selectors_are_counted_separately() {
        let mut detector = RageDetector::new(RageConfig::default());
        assert!(!detector.observe("a", 0));
        assert!(!detector.observe("b", 10));
        assert!(!detector.observe("a", 20));
        assert!(!detector.observe("b", 30));
    }

    #[test]
    fn rage_and_dead_are_independent() {
        let mut detector = RageDetector::new(RageConfig::default());
        let target = ClickTarget {
            element: div(&["hero"]),
            ancestors: vec![],
        };
        classify_click(&mut detector, &target, 0);
        classify_click(&mut detector, &target, 10);
        let third = classify_click(&mut detector, &target, 20);
        assert_eq!(
            third,
            ClickClassification {
                is_rage: true,
                is_dead: true
            }
        );

        let button = ClickTarget {
            element: ElementSnapshot::new("button"),
            ancestors: vec![],
        };
        let single = classify_click(&mut detector, &button, 30);
        assert_eq!(
            single,
            ClickClassification {
                is_rage: false,
                is_dead: false
            }
        );
    }

    proptest! {
        #[test]
        fn prop_rage_matches_window_count(gaps in proptest::collection::vec(0u64..1500, 1..40)) {
            let config = RageConfig::default();
            let mut detector = RageDetector::new(config);
            let mut times = Vec::new();
            let mut now = 0u64;
            for gap in gaps {
                now += gap;
                times.push(now);
                let in_window = times
                    .iter()
                    .filter(|t| now - **t < config.window_ms)
                    .count();
                prop_assert_eq!(detector.observe("div.x", now), in_window >= config.threshold);
            }
        }
    }
}
