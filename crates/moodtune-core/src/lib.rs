//! Core types and traits for moodtune.
//!
//! Everything that crosses a crate boundary lives here: the discretized
//! [`RecommendationState`], the 27-element [`RecommendationAction`] space, the
//! numeric [`RecommendationParams`] they map to, the collaborator records
//! ([`InteractionRecord`], [`InsightDelta`]) and the store traits the engine is
//! wired against.

#![warn(clippy::unwrap_used, clippy::expect_used)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[macro_use]
mod tag;

pub mod action;
pub mod event;
pub mod params;
pub mod profile;
pub mod run;
pub mod state;
pub mod store;

pub use action::{enumerate_actions, Diversity, Energy, Novelty, RecommendationAction};
pub use event::{InsightDelta, InsightOrigin, InteractionKind, InteractionRecord};
pub use params::RecommendationParams;
pub use profile::{PersonalityProfile, Trait, TRAIT_MAX, TRAIT_MIN};
pub use run::{JobKind, RewardStatistics, TableStats, TrainingRun, UserFailure};
pub use state::{encode_state, ContentType, Mood, RecommendationState, StateEncoder, TimeOfDay};
pub use store::{InsightFeed, InteractionLog, ProfileStore, RunLog, StoreError};
pub use tag::ParseTagError;

/// Outcome of a policy lookup, with a short human-readable reason.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Decision {
    pub action: RecommendationAction,
    pub score: f64,
    pub why: String,
    #[serde(default)]
    pub explored: bool,
}

pub trait Policy {
    fn decide(&mut self, state: &RecommendationState, explore: bool) -> Decision;
    fn feedback(
        &mut self,
        state: &RecommendationState,
        action: RecommendationAction,
        reward: f64,
        next_state: Option<&RecommendationState>,
    );
    fn snapshot(&self) -> Value;
    fn load(&mut self, snapshot: Value);
}
