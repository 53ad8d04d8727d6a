use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::event::{limits, PageviewRow};
use crate::session::group_sessions;

pub const MAX_FUNNEL_STEPS: usize = 20;
pub const MAX_FUNNELS_PER_SITE: usize = 20;
pub const MAX_FUNNEL_NAME_LEN: usize = 100;
pub const MAX_STEP_LABEL_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub path: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Funnel {
    pub id: String,
    pub site_id: String,
    pub name: String,
    pub steps: Vec<FunnelStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or replacing a funnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelDefinition {
    pub name: String,
    pub steps: Vec<FunnelStep>,
}

impl FunnelDefinition {
    /// Trim every field and enforce name, step count and step field limits.
    pub fn validate(self) -> Result<Self, PayloadError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(PayloadError::MissingField("name"));
        }
        if name.chars().count() > MAX_FUNNEL_NAME_LEN {
            return Err(PayloadError::Invalid {
                field: "name",
                reason: "must be at most 100 characters",
            });
        }
        if self.steps.is_empty() {
            return Err(PayloadError::Invalid {
                field: "steps",
                reason: "must contain at least one step",
            });
        }
        if self.steps.len() > MAX_FUNNEL_STEPS {
            return Err(PayloadError::Invalid {
                field: "steps",
                reason: "must contain at most 20 steps",
            });
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for step in self.steps {
            let path = step.path.trim().to_string();
            let label = step.label.trim().to_string();
            if path.is_empty() {
                return Err(PayloadError::MissingField("steps.path"));
            }
            if label.is_empty() {
                return Err(PayloadError::MissingField("steps.label"));
            }
            if path.chars().count() > limits::PATH {
                return Err(PayloadError::Invalid {
                    field: "steps.path",
                    reason: "must be at most 500 characters",
                });
            }
            if label.chars().count() > MAX_STEP_LABEL_LEN {
                return Err(PayloadError::Invalid {
                    field: "steps.label",
                    reason: "must be at most 100 characters",
                });
            }
            steps.push(FunnelStep { path, label });
        }
        Ok(Self { name, steps })
    }
}

/// Advance-only walk of one session's chronological paths. Returns how many
/// leading steps the session reached.
fn steps_reached<'a>(steps: &[FunnelStep], paths: impl Iterator<Item = &'a str>) -> usize {
    let mut expected = 0;
    for path in paths {
        if expected == steps.len() {
            break;
        }
        if steps[expected].path == path {
            expected += 1;
        }
    }
    expected
}

/// Number of sessions that reached each step, in step order.
pub fn step_counts(steps: &[FunnelStep], pageviews: &[PageviewRow]) -> Vec<u64> {
    let mut counts = vec![0u64; steps.len()];
    for session in group_sessions(pageviews) {
        let reached = steps_reached(steps, session.paths());
        for count in counts.iter_mut().take(reached) {
            *count += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStepResult {
    pub index: usize,
    pub path: String,
    pub label: String,
    pub sessions: u64,
    pub conversion_rate: f64,
    pub drop_off_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelReport {
    pub funnel_id: String,
    pub name: String,
    pub total_sessions: u64,
    pub steps: Vec<FunnelStepResult>,
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    crate::heatmap::round1(part as f64 / whole as f64 * 100.0)
}

/// Conversion against step 0 and drop-off against the previous step.
pub fn compute_rates(steps: &[FunnelStep], counts: &[u64]) -> Vec<FunnelStepResult> {
    let first = counts.first().copied().unwrap_or(0);
    steps
        .iter()
        .zip(counts.iter().copied())
        .enumerate()
        .map(|(index, (step, sessions))| {
            let (conversion_rate, drop_off_rate) = if first == 0 {
                (0.0, 0.0)
            } else if index == 0 {
                (percent(sessions, first), 0.0)
            } else {
                let previous = counts[index - 1];
                (
                    percent(sessions, first),
                    percent(previous.saturating_sub(sessions), previous),
                )
            };
            FunnelStepResult {
                index,
                path: step.path.clone(),
                label: step.label.clone(),
                sessions,
                conversion_rate,
                drop_off_rate,
            }
        })
        .collect()
}

pub fn evaluate_funnel(funnel: &Funnel, pageviews: &[PageviewRow]) -> FunnelReport {
    let counts = step_counts(&funnel.steps, pageviews);
    FunnelReport {
        funnel_id: funnel.id.clone(),
        name: funnel.name.clone(),
        total_sessions: group_sessions(pageviews).len() as u64,
        steps: compute_rates(&funnel.steps, &counts),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::session::fixtures::pageview;

    fn steps(paths: &[&str]) -> Vec<FunnelStep> {
        paths
            .iter()
            .map(|p| FunnelStep {
                path: p.to_string(),
                label: p.trim_start_matches('/').to_string(),
            })
            .collect()
    }

    #[test]
    fn ignores_detours_and_repeats() {
        let funnel = steps(&["/landing", "/signup", "/checkout"]);
        let rows = vec![
            pageview("pv_1", "s1", "/landing", 0),
            pageview("pv_2", "s1", "/other", 10),
            pageview("pv_3", "s1", "/landing", 20),
            pageview("pv_4", "s1", "/signup", 30),
        ];
        let counts = step_counts(&funnel, &rows);
        assert_eq!(counts, vec![1, 1, 0]);

        let rates = compute_rates(&funnel, &counts);
        assert_eq!(rates[0].drop_off_rate, 0.0);
        assert_eq!(rates[1].drop_off_rate, 0.0);
        assert_eq!(rates[1].conversion_rate, 100.0);
        assert_eq!(rates[2].conversion_rate, 0.0);
        assert_eq!(rates[2].drop_off_rate, 100.0);
    }

    #[test]
    fn out_of_order_visits_do_not_count() {
        let funnel = steps(&["/a", "/b"]);
        let rows = vec![
            pageview("pv_1", "s1", "/b", 0),
            pageview("pv_2", "s1", "/a", 10),
        ];
        assert_eq!(step_counts(&funnel, &rows), vec![1, 0]);
    }

    #[test]
    fn rates_use_one_decimal() {
        let funnel = steps(&["/a", "/b"]);
        let rates = compute_rates(&funnel, &[3, 1]);
        assert_eq!(rates[1].conversion_rate, 33.3);
        assert_eq!(rates[1].drop_off_rate, 66.7);
    }

    #[test]
    fn zero_entry_sessions_report_zero_rates() {
        let funnel = steps(&["/a", "/b"]);
        let rates = compute_rates(&funnel, &[0, 0]);
        assert!(rates
            .iter()
            .all(|r| r.conversion_rate == 0.0 && r.drop_off_rate == 0.0));
    }

    #[test]
    fn evaluate_reports_total_sessions() {
        let funnel = Funnel {
            id: "fun_1".to_string(),
            site_id: "site_1".to_string(),
            name: "Signup".to_string(),
            steps: steps(&["/a", "/b"]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let rows = vec![
            pageview("pv_1", "s1", "/a", 0),
            pageview("pv_2", "s1", "/b", 5),
            pageview("pv_3", "s2", "/a", 1),
            pageview("pv_4", "s3", "/x", 2),
        ];
        let report = evaluate_funnel(&funnel, &rows);
        assert_eq!(report.total_sessions, 3);
        assert_eq!(report.steps[0].sessions, 2);
        assert_eq!(report.steps[1].sessions, 1);
        assert_eq!(report.steps[1].drop_off_rate, 50.0);
    }

    #[test]
    fn definition_validation() {
        let ok = FunnelDefinition {
            name: "  Checkout ".to_string(),
            steps: steps(&["/cart"]),
        }
        .validate()
        .expect("valid");
        assert_eq!(ok.name, "Checkout");

        let empty = FunnelDefinition {
            name: "x".to_string(),
            steps: vec![],
        };
        assert_eq!(empty.validate().expect_err("no steps").field(), Some("steps"));

        let many = FunnelDefinition {
            name: "x".to_string(),
            steps: steps(&["/a"; 21]),
        };
        assert!(many.validate().is_err());

        let long_name = FunnelDefinition {
            name: "n".repeat(101),
            steps: steps(&["/a"]),
        };
        assert_eq!(long_name.validate().expect_err("long").field(), Some("name"));
    }

    proptest! {
        #[test]
        fn prop_counts_never_increase(
            visits in proptest::collection::vec((0u8..4, 0usize..4), 0..60),
        ) {
            let funnel = steps(&["/p0", "/p1", "/p2", "/p3"]);
            let rows: Vec<PageviewRow> = visits
                .iter()
                .enumerate()
                .map(|(i, (session, page))| {
                    pageview(&format!("pv_{i}"), &format!("s{session}"), &format!("/p{page}"), i as i64)
                })
                .collect();
            let counts = step_counts(&funnel, &rows);
            for pair in counts.windows(2) {
                prop_assert!(pair[1] <= pair[0]);
            }
            let sessions = group_sessions(&rows).len() as u64;
            prop_assert!(counts.first().copied().unwrap_or(0) <= sessions);
        }
    }
}
