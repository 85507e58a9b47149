#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Jobs and inference on top of the Q-learning agent.
//!
//! [`Engine`] wires the learner to its collaborators and exposes the three
//! entry points of the subsystem:
//!
//! - [`Engine::trigger_rl_training`]: weekly batch training over the trailing
//!   interaction window, one value-table load and one save per run.
//! - [`Engine::trigger_personality_update`]: daily dampened trait drift from
//!   insight deltas, committed atomically per user.
//! - [`Engine::get_recommendation_params`]: greedy lookup for serving, which
//!   never fails and falls back to the cold-start action.
//!
//! Both jobs append one [`TrainingRun`] row to the run log.

#[macro_use]
mod log;

pub mod config;
pub mod error;
pub mod evolve;
pub mod memory;
pub mod stats;
pub mod training;

pub use config::{AggregationConfig, EngineConfig, TrainingConfig};
pub use error::{EngineError, Result};
pub use evolve::{TraitChange, TraitChangeReport};
pub use memory::MemoryStore;
pub use training::TrainingReport;

use config::validate_dampening;
use moodtune_core::{
    ContentType, Decision, InsightFeed, InsightOrigin, InteractionLog, JobKind, Mood,
    PersonalityProfile, ProfileStore, RecommendationAction, RecommendationParams, RunLog,
    StateEncoder, TableStats, TimeOfDay, TrainingRun, UserFailure,
};
use moodtune_qlearn::{MemoryTableStore, QLearningAgent, TableStore, ValueTable};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use std::time::Duration as StdDuration;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// External stores the engine reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub tables: Arc<dyn TableStore + Send + Sync>,
    pub interactions: Arc<dyn InteractionLog + Send + Sync>,
    pub profiles: Arc<dyn ProfileStore + Send + Sync>,
    pub insights: Arc<dyn InsightFeed + Send + Sync>,
    pub runs: Arc<dyn RunLog + Send + Sync>,
}

impl Collaborators {
    /// Every collaborator backed by one [`MemoryStore`].
    #[must_use]
    pub fn in_memory(store: Arc<MemoryStore>, tables: Arc<MemoryTableStore>) -> Self {
        Self {
            tables,
            interactions: store.clone(),
            profiles: store.clone(),
            insights: store.clone(),
            runs: store,
        }
    }
}

/// Target of a personality update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSelector {
    One(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityReport {
    pub run: TrainingRun,
    pub changes: Vec<TraitChangeReport>,
}

/// Serving result: the encoded state, why the action was chosen and the
/// parameters it maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub state: String,
    pub decision: Decision,
    pub params: RecommendationParams,
}

pub struct Engine {
    config: EngineConfig,
    encoder: StateEncoder,
    stores: Collaborators,
    training_lock: Mutex<()>,
    inference: RwLock<QLearningAgent>,
    clock: fn() -> OffsetDateTime,
}

impl Engine {
    /// Validates `config` and loads the persisted table for serving. A
    /// missing or corrupt table yields an empty one.
    pub fn new(config: EngineConfig, stores: Collaborators) -> Result<Self> {
        let config = config.validate()?;
        let table = stores.tables.load(config.bins);
        info_event!(
            "value table loaded: {} entries over {} states",
            table.len(),
            table.state_count()
        );
        Ok(Self {
            encoder: StateEncoder::new(config.bins),
            inference: RwLock::new(QLearningAgent::new(config.learning, table)),
            training_lock: Mutex::new(()),
            clock: OffsetDateTime::now_utc,
            config,
            stores,
        })
    }

    /// Replaces the wall clock used for job windows and timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scheduled or manual training with the configured window.
    pub fn trigger_rl_training(&self) -> Result<TrainingReport> {
        let cfg = self.config.training;
        self.run_training(cfg.window_days, cfg.min_interactions_per_user)
    }

    /// Trains on the trailing `window_days` of interactions.
    ///
    /// Runs are mutually exclusive. The table is loaded once at the start
    /// and saved once at the end; a timed-out run leaves no trace.
    pub fn run_training(
        &self,
        window_days: u32,
        min_interactions_per_user: usize,
    ) -> Result<TrainingReport> {
        let _guard = match self.training_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(EngineError::TrainingInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let started_at = (self.clock)();
        let since = started_at - Duration::days(i64::from(window_days));
        let records: Vec<_> = self
            .stores
            .interactions
            .interactions_since(since)?
            .into_iter()
            .filter(|r| r.ts >= since)
            .collect();
        info_event!("training on {} interactions since {}", records.len(), since);

        let table = self.stores.tables.load(self.config.bins);
        let mut agent = QLearningAgent::new(self.config.learning, table);
        let mut run = TrainingRun::started(JobKind::RlTraining, started_at);

        let trainer = training::Trainer {
            profiles: self.stores.profiles.as_ref(),
            encoder: self.encoder,
            reward: self.config.reward,
            min_interactions: min_interactions_per_user,
            max_duration: self
                .config
                .training
                .max_duration_secs
                .map(StdDuration::from_secs),
        };
        let samples = trainer.train(&mut agent, records, &mut run)?;

        agent.decay_epsilon();
        let finished_at = (self.clock)();
        agent.finish_run(rfc3339(finished_at));
        let table_stats = agent.stats();
        let table = agent.into_table();
        self.stores.tables.save(&table)?;

        let reward = stats::summarize_rewards(&samples);
        run.finished_at = finished_at;
        run.mean_reward = Some(reward.mean());
        run.reward = Some(reward);
        run.table = Some(table_stats);
        self.append_run(&run);
        self.swap_inference(table);

        info_event!(
            "training finished: {} users, {} records, mean reward {:.3}, {} entries",
            run.users_processed,
            run.records_processed,
            reward.mean(),
            table_stats.entries
        );

        Ok(TrainingReport {
            by_action: stats::aggregate_rewards(&samples, |s| Some(s.action.key())),
            run,
        })
    }

    /// Aggregates and commits trait updates for one or all users.
    ///
    /// Per-user failures are collected in the run record rather than
    /// aborting the batch.
    pub fn trigger_personality_update(&self, target: UserSelector) -> Result<PersonalityReport> {
        let started_at = (self.clock)();
        let users = match target {
            UserSelector::One(user_id) => vec![user_id],
            UserSelector::All => self.stores.profiles.user_ids()?,
        };
        let agg = self.config.aggregation;

        let mut run = TrainingRun::started(JobKind::PersonalityUpdate, started_at);
        let mut changes = Vec::new();
        for user_id in users {
            match self.aggregate_and_update(&user_id, agg.window_days, agg.dampening) {
                Ok(report) => {
                    run.users_processed += 1;
                    changes.push(report);
                }
                Err(e) => {
                    warn_event!("personality update failed for {}: {}", user_id, e);
                    run.failures.push(UserFailure {
                        user_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        run.finished_at = (self.clock)();
        if !changes.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let mean = changes
                .iter()
                .map(TraitChangeReport::mean_abs_delta)
                .sum::<f64>()
                / changes.len() as f64;
            run.mean_trait_shift = Some(mean);
        }
        self.append_run(&run);
        Ok(PersonalityReport { run, changes })
    }

    /// Sums the user's insight deltas over the window, dampens them and
    /// commits all five traits in a single write.
    ///
    /// Only deltas newer than the profile's aggregation watermark are used,
    /// and the watermark moves to `now` in the same commit, so each delta is
    /// applied once no matter how often the job runs. Deltas that arrive
    /// with a timestamp at or before the watermark are never applied.
    pub fn aggregate_and_update(
        &self,
        user_id: &str,
        window_days: u32,
        dampening: f64,
    ) -> Result<TraitChangeReport> {
        let dampening = validate_dampening(dampening)?;
        let now = (self.clock)();
        let current = evolve::ensure_profile(user_id, self.stores.profiles.profile(user_id)?)?;
        let window_start = now - Duration::days(i64::from(window_days));
        let watermark = current.aggregated_through();
        let since = watermark.map_or(window_start, |w| w.max(window_start));

        let mut deltas = Vec::new();
        for &origin in InsightOrigin::ALL {
            deltas.extend(
                self.stores
                    .insights
                    .insights_since(user_id, origin, since)?
                    .into_iter()
                    .filter(|d| evolve::is_pending(d, user_id, window_start, watermark, now)),
            );
        }

        let (updated, changes) =
            evolve::apply_dampened(&current, evolve::sum_deltas(&deltas), dampening);
        let through = watermark.map_or(now, |w| w.max(now));
        let updated = updated.with_aggregated_through(Some(through));
        self.stores.profiles.commit_profile(user_id, &updated)?;

        Ok(TraitChangeReport {
            user_id: user_id.to_string(),
            insights_used: deltas.len(),
            changes,
            committed_at: now,
        })
    }

    /// Parameters for the next recommendation. Never fails: any problem
    /// degrades to the cold-start action's parameters.
    #[must_use]
    pub fn get_recommendation_params(
        &self,
        user_id: &str,
        profile: &PersonalityProfile,
        content_type: ContentType,
        mood: Mood,
        time_of_day: TimeOfDay,
    ) -> RecommendationParams {
        self.recommend(user_id, profile, content_type, mood, time_of_day)
            .params
    }

    #[must_use]
    pub fn recommend(
        &self,
        user_id: &str,
        profile: &PersonalityProfile,
        content_type: ContentType,
        mood: Mood,
        time_of_day: TimeOfDay,
    ) -> Recommendation {
        let state = self.encoder.encode(profile, content_type, mood, time_of_day);
        let decision = match self.inference.read() {
            Ok(agent) => agent.greedy_decision(&state),
            Err(_) => {
                warn_event!("inference agent unavailable; serving defaults to {}", user_id);
                Decision {
                    action: RecommendationAction::cold_start(),
                    score: 0.0,
                    why: "fallback".into(),
                    explored: false,
                }
            }
        };
        Recommendation {
            state: state.key(),
            params: decision.action.to_params(),
            decision,
        }
    }

    /// Reloads the serving table from the store.
    pub fn reload(&self) {
        let table = self.stores.tables.load(self.config.bins);
        self.swap_inference(table);
    }

    #[must_use]
    pub fn table_stats(&self) -> TableStats {
        match self.inference.read() {
            Ok(agent) => agent.stats(),
            Err(poisoned) => poisoned.into_inner().stats(),
        }
    }

    /// Copy of the serving table.
    #[must_use]
    pub fn table(&self) -> ValueTable {
        match self.inference.read() {
            Ok(agent) => agent.table().clone(),
            Err(poisoned) => poisoned.into_inner().table().clone(),
        }
    }

    fn swap_inference(&self, table: ValueTable) {
        let agent = QLearningAgent::new(self.config.learning, table);
        match self.inference.write() {
            Ok(mut guard) => *guard = agent,
            Err(poisoned) => *poisoned.into_inner() = agent,
        }
    }

    fn append_run(&self, run: &TrainingRun) {
        if let Err(e) = self.stores.runs.append(run) {
            warn_event!("failed to append {} run record: {}", run.job, e);
        }
    }
}

fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}
