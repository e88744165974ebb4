//! Reduces probe outcomes into a discovery report.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::Classification;
use crate::types::{ProbeOutcome, ProbeTarget};

/// Keys listed in a shape summary before it is cut short.
const MAX_SUMMARY_KEYS: usize = 12;

/// Shallow description of a JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeSummary {
    Array {
        len: usize,
        /// Keys of the first element, when it is an object.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_item_keys: Option<Vec<String>>,
    },
    Object { keys: Vec<String> },
}

impl ShapeSummary {
    /// Summarize `body` if it is a JSON array or object.
    pub fn from_body(body: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(body).ok()? {
            Value::Array(items) => Some(ShapeSummary::Array {
                len: items.len(),
                first_item_keys: items
                    .first()
                    .and_then(Value::as_object)
                    .map(|o| o.keys().cloned().collect()),
            }),
            Value::Object(map) => Some(ShapeSummary::Object {
                keys: map.keys().cloned().collect(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShapeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeSummary::Array { len: 1, .. } => write!(f, "array of 1 item"),
            ShapeSummary::Array { len, .. } => write!(f, "array of {len} items"),
            ShapeSummary::Object { keys } => {
                let shown: Vec<&str> = keys.iter().take(MAX_SUMMARY_KEYS).map(String::as_str).collect();
                let more = keys.len().saturating_sub(MAX_SUMMARY_KEYS);
                if more > 0 {
                    write!(f, "object with top-level keys {{{}, +{more} more}}", shown.join(", "))
                } else {
                    write!(f, "object with top-level keys {{{}}}", shown.join(", "))
                }
            }
        }
    }
}

/// A target that answered 2xx.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingEndpoint {
    pub target: ProbeTarget,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeSummary>,
}

/// Outcome count per classification. Every class is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts(BTreeMap<Classification, usize>);

impl Default for ClassificationCounts {
    fn default() -> Self {
        Self(Classification::ALL.iter().map(|c| (*c, 0)).collect())
    }
}

impl ClassificationCounts {
    pub fn get(&self, class: Classification) -> usize {
        self.0.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Classification, usize)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }

    fn bump(&mut self, class: Classification) {
        *self.0.entry(class).or_insert(0) += 1;
    }
}

/// Terminal artifact of a discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub outcomes: Vec<ProbeOutcome>,
    pub working: Vec<WorkingEndpoint>,
    pub counts: ClassificationCounts,
    pub generated_at: DateTime<Utc>,
}

impl DiscoveryReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, class: Classification) -> usize {
        self.counts.get(class)
    }

    /// Percentage of outcomes classified reachable; 0 for an empty report.
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.count(Classification::Reachable) as f64 / self.outcomes.len() as f64 * 100.0
    }

    /// Outcomes for one base URL, in probe order.
    pub fn for_base<'a>(&'a self, base_url: &'a str) -> impl Iterator<Item = &'a ProbeOutcome> + 'a {
        self.outcomes.iter().filter(move |o| o.target.base_url == base_url)
    }

    /// Distinct base URLs in first-seen order.
    pub fn base_urls(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.outcomes
            .iter()
            .map(|o| o.target.base_url.as_str())
            .filter(|b| seen.insert(*b))
            .collect()
    }
}

/// Incremental reducer. Never fails.
#[derive(Debug, Default)]
pub struct SurfaceAggregator {
    outcomes: Vec<ProbeOutcome>,
    working: Vec<WorkingEndpoint>,
    seen_working: HashSet<ProbeTarget>,
    counts: ClassificationCounts,
}

impl SurfaceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: ProbeOutcome) {
        self.counts.bump(outcome.classification);

        if outcome.is_reachable() && self.seen_working.insert(outcome.target.clone()) {
            self.working.push(WorkingEndpoint {
                target: outcome.target.clone(),
                status: outcome.status.unwrap_or_default(),
                shape: ShapeSummary::from_body(&outcome.body),
            });
        }

        self.outcomes.push(outcome);
    }

    pub fn finish(self) -> DiscoveryReport {
        DiscoveryReport {
            outcomes: self.outcomes,
            working: self.working,
            counts: self.counts,
            generated_at: Utc::now(),
        }
    }
}

/// One-shot aggregation over an ordered outcome list.
pub fn aggregate(outcomes: impl IntoIterator<Item = ProbeOutcome>) -> DiscoveryReport {
    let mut agg = SurfaceAggregator::new();
    for outcome in outcomes {
        agg.record(outcome);
    }
    agg.finish()
}
