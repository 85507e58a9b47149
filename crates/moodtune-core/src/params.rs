//! Fixed mapping from actions to numeric recommendation parameters.

use crate::action::{Diversity, Energy, Novelty, RecommendationAction};
use serde::{Deserialize, Serialize};

/// Parameters handed to the content-recommendation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationParams {
    pub min_energy: f64,
    pub max_energy: f64,
    pub valence_target: f64,
    pub category_count: u8,
    pub popularity_min: u8,
    pub popularity_max: u8,
    pub exploration_rate: f64,
}

impl Energy {
    #[must_use]
    pub fn range(self) -> (f64, f64) {
        match self {
            Energy::Low => (0.0, 0.4),
            Energy::Medium => (0.3, 0.7),
            Energy::High => (0.6, 1.0),
        }
    }
}

impl Diversity {
    #[must_use]
    pub fn category_count(self) -> u8 {
        match self {
            Diversity::Focused => 1,
            Diversity::Balanced => 3,
            Diversity::Diverse => 5,
        }
    }
}

impl Novelty {
    /// `(popularity_min, popularity_max, exploration_rate)`.
    #[must_use]
    pub fn window(self) -> (u8, u8, f64) {
        match self {
            Novelty::Familiar => (60, 100, 0.1),
            Novelty::Mixed => (30, 80, 0.3),
            Novelty::Exploratory => (0, 50, 0.6),
        }
    }
}

impl RecommendationAction {
    #[must_use]
    pub fn to_params(&self) -> RecommendationParams {
        let (min_energy, max_energy) = self.energy.range();
        let (popularity_min, popularity_max, exploration_rate) = self.novelty.window();
        RecommendationParams {
            min_energy,
            max_energy,
            valence_target: 0.3 + 0.5 * (min_energy + max_energy) / 2.0,
            category_count: self.diversity.category_count(),
            popularity_min,
            popularity_max,
            exploration_rate,
        }
    }
}

impl RecommendationParams {
    /// Parameters for the cold-start action, used whenever adaptive tuning is unavailable.
    #[must_use]
    pub fn fallback() -> Self {
        RecommendationAction::cold_start().to_params()
    }
}
