//! Reward aggregation for run evaluation.

use moodtune_core::{RecommendationAction, RewardStatistics};
use std::collections::BTreeMap;

/// One applied update: which action earned which reward for whom.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardSample {
    pub user_id: String,
    pub action: RecommendationAction,
    pub reward: f64,
}

/// Aggregate samples by a grouping key (e.g. action, user).
#[must_use]
pub fn aggregate_rewards(
    samples: &[RewardSample],
    key_fn: impl Fn(&RewardSample) -> Option<String>,
) -> BTreeMap<String, RewardStatistics> {
    let mut stats: BTreeMap<String, RewardStatistics> = BTreeMap::new();
    for sample in samples {
        if let Some(key) = key_fn(sample) {
            stats.entry(key).or_default().record(sample.reward);
        }
    }
    stats
}

#[must_use]
pub fn summarize_rewards(samples: &[RewardSample]) -> RewardStatistics {
    let mut stats = RewardStatistics::default();
    for sample in samples {
        stats.record(sample.reward);
    }
    stats
}
