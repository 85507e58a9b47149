//! Batch training over logged interactions.
//!
//! Episodes are built per user first (profile lookup, state reconstruction,
//! reward), which is the only fallible part; the resulting updates are then
//! applied to the agent one after another. A failing user therefore never
//! leaves half an episode in the table.

use crate::error::{EngineError, Result};
use crate::stats::RewardSample;
use moodtune_core::{
    InteractionRecord, ProfileStore, RecommendationAction, RecommendationState, RewardStatistics,
    StateEncoder, TrainingRun, UserFailure,
};
use moodtune_qlearn::{reward, QLearningAgent, RewardConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Result of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run: TrainingRun,
    /// Reward statistics keyed by canonical action string.
    pub by_action: BTreeMap<String, RewardStatistics>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Step {
    state: RecommendationState,
    action: RecommendationAction,
    reward: f64,
}

#[derive(Debug, Default)]
struct Episode {
    steps: Vec<Step>,
    skipped: usize,
}

/// Groups records by user; users iterate in a stable order.
#[must_use]
pub fn group_by_user(records: Vec<InteractionRecord>) -> BTreeMap<String, Vec<InteractionRecord>> {
    let mut groups: BTreeMap<String, Vec<InteractionRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.user_id.clone()).or_default().push(record);
    }
    groups
}

pub(crate) struct Trainer<'a> {
    pub profiles: &'a dyn ProfileStore,
    pub encoder: StateEncoder,
    pub reward: RewardConfig,
    pub min_interactions: usize,
    pub max_duration: Option<Duration>,
}

impl Trainer<'_> {
    /// Applies every eligible episode to `agent` and fills in the per-user
    /// counters of `run`. Fails only on timeout; the caller must then drop
    /// the agent without persisting it.
    pub fn train(
        &self,
        agent: &mut QLearningAgent,
        records: Vec<InteractionRecord>,
        run: &mut TrainingRun,
    ) -> Result<Vec<RewardSample>> {
        let started = Instant::now();
        let mut samples = Vec::new();

        for (user_id, user_records) in group_by_user(records) {
            if let Some(limit) = self.max_duration {
                if started.elapsed() >= limit {
                    warn_event!("training run exceeded {:?}; discarding", limit);
                    return Err(EngineError::TimedOut(limit));
                }
            }

            if user_records.len() < self.min_interactions {
                run.users_skipped += 1;
                continue;
            }

            let episode = match self.episode(&user_id, user_records) {
                Ok(episode) => episode,
                Err(reason) => {
                    warn_event!("skipping user {} in training: {}", user_id, reason);
                    run.failures.push(UserFailure { user_id, reason });
                    continue;
                }
            };

            for step in &episode.steps {
                agent.update(&step.state, step.action, step.reward, None);
                samples.push(RewardSample {
                    user_id: user_id.clone(),
                    action: step.action,
                    reward: step.reward,
                });
            }
            if episode.skipped > 0 {
                info_event!(
                    "user {}: {} records without serve-time action skipped",
                    user_id,
                    episode.skipped
                );
            }
            run.users_processed += 1;
            run.records_processed += episode.steps.len();
            run.records_skipped += episode.skipped;
        }

        Ok(samples)
    }

    /// Chronological steps for one user against their current profile.
    fn episode(
        &self,
        user_id: &str,
        mut records: Vec<InteractionRecord>,
    ) -> std::result::Result<Episode, String> {
        let profile = match self.profiles.profile(user_id) {
            Ok(Some(profile)) => profile,
            Ok(None) => return Err("missing personality profile".into()),
            Err(e) => return Err(format!("profile lookup failed: {e}")),
        };

        records.sort_by_key(|r| r.ts);
        let mut episode = Episode::default();
        for record in &records {
            let Some(action) = record.served_action else {
                episode.skipped += 1;
                continue;
            };
            let state = self.encoder.encode(
                &profile,
                record.content_type,
                record.serve_mood(),
                record.time_of_day(),
            );
            episode.steps.push(Step {
                state,
                action,
                reward: reward(record, &self.reward),
            });
        }
        Ok(episode)
    }
}
