#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Tabular Q-learning over recommendation states.
//!
//! [`QLearningAgent`] owns a [`ValueTable`] and implements the
//! [`Policy`](moodtune_core::Policy) trait: ε-greedy selection while training,
//! greedy lookups for serving, and the one-step update
//! `Q(s,a) ← Q(s,a) + α·[r + γ·max_a' Q(s',a') − Q(s,a)]`.

#[macro_use]
mod log;

pub mod config;
pub mod error;
pub mod reward;
pub mod store;
pub mod table;

pub use config::{LearningConfig, RewardConfig};
pub use error::{QLearnError, Result};
pub use reward::reward;
pub use store::{JsonFileTableStore, MemoryTableStore, TableStore};
pub use table::{TableDocument, TableMeta, ValueTable};

use moodtune_core::{
    enumerate_actions, Decision, Policy, RecommendationAction, RecommendationState, TableStats,
};
use rand::prelude::*;
use serde_json::Value;

/// ε-greedy tabular learner.
///
/// The table is exclusively owned; callers get it back with
/// [`QLearningAgent::into_table`] once a run is finished.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    table: ValueTable,
    config: LearningConfig,
    epsilon: f64,
    actions: Vec<RecommendationAction>,
}

impl QLearningAgent {
    /// Resumes the exploration rate stored in `table`, clamped into
    /// `[epsilon_min, epsilon_start]`.
    #[must_use]
    pub fn new(config: LearningConfig, table: ValueTable) -> Self {
        let config = config.sanitized();
        let epsilon = table
            .meta
            .epsilon
            .map_or(config.epsilon_start, |e| {
                e.clamp(config.epsilon_min, config.epsilon_start)
            });
        Self {
            table,
            config,
            epsilon,
            actions: enumerate_actions(),
        }
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    #[must_use]
    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    #[must_use]
    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    #[must_use]
    pub fn q_value(&self, state: &RecommendationState, action: &RecommendationAction) -> f64 {
        self.table.get(state, action)
    }

    #[must_use]
    pub fn stats(&self) -> TableStats {
        self.table.stats(self.epsilon)
    }

    /// Greedy choice over the full action space.
    #[must_use]
    pub fn best_action(&self, state: &RecommendationState) -> (RecommendationAction, f64) {
        self.table
            .best_action(state, &self.actions)
            .unwrap_or((RecommendationAction::cold_start(), 0.0))
    }

    /// With `explore`, draws a uniform random action with probability ε;
    /// otherwise returns the greedy action. Serving always passes `false`.
    #[must_use]
    pub fn select_action(&self, state: &RecommendationState, explore: bool) -> RecommendationAction {
        self.select_action_with(state, explore, &mut thread_rng()).0
    }

    /// Like [`Self::select_action`] with a caller-supplied RNG. The flag
    /// reports whether the exploration branch was taken.
    pub fn select_action_with<R: Rng + ?Sized>(
        &self,
        state: &RecommendationState,
        explore: bool,
        rng: &mut R,
    ) -> (RecommendationAction, bool) {
        if explore && rng.gen::<f64>() < self.epsilon {
            if let Some(action) = self.actions.choose(rng) {
                return (*action, true);
            }
        }
        (self.best_action(state).0, false)
    }

    /// Greedy [`Decision`] for serving; never explores.
    #[must_use]
    pub fn greedy_decision(&self, state: &RecommendationState) -> Decision {
        let (action, score) = self.best_action(state);
        let why = if self.table.knows_state(state) {
            "exploit q"
        } else {
            "cold start default"
        };
        Decision {
            action,
            score,
            why: why.into(),
            explored: false,
        }
    }

    /// One-step update; returns the new estimate. `next_state = None` means
    /// the transition is terminal and the bootstrap term is zero.
    pub fn update(
        &mut self,
        state: &RecommendationState,
        action: RecommendationAction,
        reward: f64,
        next_state: Option<&RecommendationState>,
    ) -> f64 {
        let current = self.table.get(state, &action);
        if !reward.is_finite() {
            warn_event!("ignoring non-finite reward for {}", table::entry_key(state, &action));
            return current;
        }
        let bootstrap = next_state.map_or(0.0, |s| self.table.max_value(s));
        let target = reward + self.config.gamma * bootstrap;
        let updated = current + self.config.alpha * (target - current);
        self.table.set(*state, action, updated);
        updated
    }

    /// Multiplicative decay toward the floor. Called once per completed run.
    pub fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
    }

    /// Hands the table back with the current exploration rate recorded.
    #[must_use]
    pub fn into_table(mut self) -> ValueTable {
        self.table.meta.epsilon = Some(self.epsilon);
        self.table
    }

    /// Marks a finished run in the table metadata.
    pub fn finish_run(&mut self, updated_at: String) {
        self.table.meta.runs += 1;
        self.table.meta.updated_at = Some(updated_at);
    }
}

impl Policy for QLearningAgent {
    fn decide(&mut self, state: &RecommendationState, explore: bool) -> Decision {
        let (action, explored) = self.select_action_with(state, explore, &mut thread_rng());
        if !explored {
            return self.greedy_decision(state);
        }
        Decision {
            action,
            score: self.table.get(state, &action),
            why: "explore ε".into(),
            explored,
        }
    }

    fn feedback(
        &mut self,
        state: &RecommendationState,
        action: RecommendationAction,
        reward: f64,
        next_state: Option<&RecommendationState>,
    ) {
        self.update(state, action, reward, next_state);
    }

    /// Persisted document including the current ε.
    fn snapshot(&self) -> Value {
        let mut table = self.table.clone();
        table.meta.epsilon = Some(self.epsilon);
        serde_json::to_value(table.to_document()).unwrap_or(Value::Null)
    }

    /// Replaces the table from a snapshot; anything unusable resets to empty.
    fn load(&mut self, snapshot: Value) {
        let bins = self.table.bins();
        let table = serde_json::from_value::<TableDocument>(snapshot)
            .map_err(QLearnError::from)
            .and_then(|doc| ValueTable::from_document(doc, bins))
            .unwrap_or_else(|e| {
                warn_event!("policy snapshot rejected; starting empty: {}", e);
                ValueTable::new(bins)
            });
        *self = Self::new(self.config, table);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use moodtune_core::{
        encode_state, ContentType, Diversity, Energy, Mood, Novelty, PersonalityProfile, TimeOfDay,
    };
    use rand::rngs::StdRng;

    fn scenario_state() -> RecommendationState {
        let profile = PersonalityProfile::new(85.0, 50.0, 35.0, 50.0, 25.0);
        encode_state(&profile, ContentType::Music, Mood::Relaxed, TimeOfDay::Evening)
    }

    fn agent() -> QLearningAgent {
        QLearningAgent::new(LearningConfig::default(), ValueTable::new(5))
    }

    #[test]
    fn scenario_single_update_moves_to_point_two_three() {
        let mut agent = agent();
        let state = scenario_state();
        assert_eq!(state.trait_bins[0], 4);
        assert_eq!(state.trait_bins[2], 1);
        assert_eq!(state.trait_bins[4], 1);
        let action = RecommendationAction::new(Energy::Low, Diversity::Focused, Novelty::Mixed);
        let q = agent.update(&state, action, 2.3, None);
        assert!((q - 0.23).abs() < 1e-12);
        assert!((agent.q_value(&state, &action) - 0.23).abs() < 1e-12);
    }

    #[test]
    fn terminal_updates_converge_monotonically_without_overshoot() {
        let mut agent = agent();
        let state = scenario_state();
        let action = RecommendationAction::cold_start();
        let mut last = 0.0;
        for _ in 0..500 {
            let q = agent.update(&state, action, 1.0, None);
            assert!(q > last);
            assert!(q <= 1.0);
            last = q;
        }
        assert!((last - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bootstrap_uses_best_next_value() {
        let mut agent = agent();
        let s = scenario_state();
        let mut next = s;
        next.mood = Mood::Happy;
        let a = RecommendationAction::cold_start();
        agent.table.set(next, enumerate_actions()[3], 1.0);
        let q = agent.update(&s, a, 0.0, Some(&next));
        assert!((q - 0.1 * 0.95).abs() < 1e-12);
    }

    #[test]
    fn non_finite_reward_is_ignored() {
        let mut agent = agent();
        let s = scenario_state();
        let q = agent.update(&s, RecommendationAction::cold_start(), f64::NAN, None);
        assert_eq!(q, 0.0);
        assert!(agent.table().is_empty());
    }

    #[test]
    fn greedy_selection_without_exploration() {
        let mut agent = agent();
        let s = scenario_state();
        assert_eq!(agent.select_action(&s, false), RecommendationAction::cold_start());
        let target = enumerate_actions()[13];
        agent.update(&s, target, 1.0, None);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert_eq!(agent.select_action_with(&s, false, &mut rng), (target, false));
        }
    }

    #[test]
    fn exploration_rate_controls_random_draws() {
        let mut config = LearningConfig::default();
        config.epsilon_start = 1.0;
        let agent = QLearningAgent::new(config, ValueTable::new(5));
        let s = scenario_state();
        let mut rng = StdRng::seed_from_u64(42);
        let explored = (0..200)
            .filter(|_| agent.select_action_with(&s, true, &mut rng).1)
            .count();
        assert_eq!(explored, 200);

        config.epsilon_start = 0.0;
        config.epsilon_min = 0.0;
        let agent = QLearningAgent::new(config, ValueTable::new(5));
        let explored = (0..200)
            .filter(|_| agent.select_action_with(&s, true, &mut rng).1)
            .count();
        assert_eq!(explored, 0);
    }

    #[test]
    fn decide_reports_exploration() {
        let mut config = LearningConfig::default();
        config.epsilon_start = 1.0;
        let mut table = ValueTable::new(5);
        let s = scenario_state();
        for (i, a) in enumerate_actions().iter().enumerate() {
            table.set(s, *a, i as f64);
        }
        let mut agent = QLearningAgent::new(config, table);

        for _ in 0..20 {
            let d = agent.decide(&s, true);
            assert!(d.explored);
            assert_eq!(d.why, "explore ε");
            assert_eq!(d.score, agent.q_value(&s, &d.action));
        }

        let d = agent.decide(&s, false);
        assert!(!d.explored);
        assert_eq!(d.why, "exploit q");
        assert_eq!(d.action, *enumerate_actions().last().unwrap());
    }

    #[test]
    fn epsilon_decays_to_floor() {
        let mut agent = agent();
        assert!((agent.epsilon() - 0.3).abs() < 1e-12);
        agent.decay_epsilon();
        assert!((agent.epsilon() - 0.3 * 0.995).abs() < 1e-12);
        for _ in 0..2000 {
            agent.decay_epsilon();
        }
        assert!((agent.epsilon() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn stored_epsilon_is_resumed_and_clamped() {
        let mut table = ValueTable::new(5);
        table.meta.epsilon = Some(0.12);
        assert!((QLearningAgent::new(LearningConfig::default(), table.clone()).epsilon() - 0.12).abs() < 1e-12);
        table.meta.epsilon = Some(0.9);
        assert!((QLearningAgent::new(LearningConfig::default(), table).epsilon() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn decide_explains_cold_start_and_exploitation() {
        let mut agent = agent();
        let s = scenario_state();
        let d = agent.decide(&s, false);
        assert_eq!(d.why, "cold start default");
        assert_eq!(d.action, RecommendationAction::cold_start());
        agent.feedback(&s, enumerate_actions()[2], 1.0, None);
        let d = agent.decide(&s, false);
        assert_eq!(d.why, "exploit q");
        assert_eq!(d.action, enumerate_actions()[2]);
        assert!((d.score - 0.1).abs() < 1e-12);
    }

    #[test]
    fn snapshot_roundtrip_and_bad_snapshot_resets() {
        let mut agent = agent();
        let s = scenario_state();
        agent.update(&s, enumerate_actions()[8], 0.5, None);
        agent.decay_epsilon();
        let snap = agent.snapshot();

        let mut restored = self::agent();
        restored.load(snap);
        assert!((restored.q_value(&s, &enumerate_actions()[8]) - 0.05).abs() < 1e-12);
        assert!((restored.epsilon() - agent.epsilon()).abs() < 1e-12);

        restored.load(serde_json::json!({"bins": "five"}));
        assert!(restored.table().is_empty());
        assert!((restored.epsilon() - 0.3).abs() < 1e-12);
    }
}
