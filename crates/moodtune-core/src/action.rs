//! The fixed action space: energy × diversity × novelty.

use crate::tag::ParseTagError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ACTION_COUNT: usize = 27;

tag_enum! {
    Energy ("energy") {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

tag_enum! {
    Diversity ("diversity") {
        Focused => "focused",
        Balanced => "balanced",
        Diverse => "diverse",
    }
}

tag_enum! {
    Novelty ("novelty") {
        Familiar => "familiar",
        Mixed => "mixed",
        Exploratory => "exploratory",
    }
}

/// One recommendation-tuning strategy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RecommendationAction {
    pub energy: Energy,
    pub diversity: Diversity,
    pub novelty: Novelty,
}

impl RecommendationAction {
    #[must_use]
    pub const fn new(energy: Energy, diversity: Diversity, novelty: Novelty) -> Self {
        Self {
            energy,
            diversity,
            novelty,
        }
    }

    /// Position in [`enumerate_actions`]: `9·energy + 3·diversity + novelty`.
    #[must_use]
    pub fn index(&self) -> usize {
        self.energy.index() * 9 + self.diversity.index() * 3 + self.novelty.index()
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= ACTION_COUNT {
            return None;
        }
        Some(Self::new(
            Energy::ALL[index / 9],
            Diversity::ALL[(index / 3) % 3],
            Novelty::ALL[index % 3],
        ))
    }

    /// What an untrained table yields: the first action in canonical order.
    #[must_use]
    pub const fn cold_start() -> Self {
        Self::new(Energy::Low, Diversity::Focused, Novelty::Familiar)
    }

    /// Canonical string form, e.g. `high|balanced|exploratory`.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RecommendationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.energy, self.diversity, self.novelty)
    }
}

impl FromStr for RecommendationAction {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('|');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(e), Some(d), Some(n), None) => Ok(Self::new(e.parse()?, d.parse()?, n.parse()?)),
            _ => Err(ParseTagError {
                kind: "action",
                value: s.to_string(),
            }),
        }
    }
}

/// The 27 actions in their stable canonical order.
///
/// Ties in value lookups are broken by this order, so it must never change.
#[must_use]
pub fn enumerate_actions() -> Vec<RecommendationAction> {
    let mut actions = Vec::with_capacity(ACTION_COUNT);
    for &energy in Energy::ALL {
        for &diversity in Diversity::ALL {
            for &novelty in Novelty::ALL {
                actions.push(RecommendationAction::new(energy, diversity, novelty));
            }
        }
    }
    actions
}
