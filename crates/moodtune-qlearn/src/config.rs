//! Learner and reward constants.
//!
//! The defaults are starting points, not derived values; deployments may tune
//! them through the engine configuration file.

use serde::{Deserialize, Serialize};

/// Step size, discount and exploration schedule of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon_start: f64,
    /// Multiplicative decay applied once per training run.
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.95,
            epsilon_start: 0.3,
            epsilon_decay: 0.995,
            epsilon_min: 0.05,
        }
    }
}

impl LearningConfig {
    /// Forces every field into its meaningful range. Non-finite values fall
    /// back to the defaults.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let unit = |v: f64, fallback: f64| {
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                fallback
            }
        };
        let epsilon_start = unit(self.epsilon_start, d.epsilon_start);
        let epsilon_decay = match unit(self.epsilon_decay, d.epsilon_decay) {
            v if v == 0.0 => d.epsilon_decay,
            v => v,
        };
        Self {
            alpha: unit(self.alpha, d.alpha),
            gamma: unit(self.gamma, d.gamma),
            epsilon_start,
            epsilon_decay,
            epsilon_min: unit(self.epsilon_min, d.epsilon_min).min(epsilon_start),
        }
    }
}

/// Per-signal reward contributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub like: f64,
    pub dislike: f64,
    pub share: f64,
    pub complete: f64,
    pub skip: f64,
    /// Reward at full completion; scales the completion fraction.
    pub completion_weight: f64,
    /// Reward for moving across the whole mood scale.
    pub mood_weight: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            like: 1.0,
            dislike: -1.0,
            share: 0.8,
            complete: 0.5,
            skip: -0.3,
            completion_weight: 0.5,
            mood_weight: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_clamps_and_keeps_min_below_start() {
        let cfg = LearningConfig {
            alpha: 3.0,
            gamma: -1.0,
            epsilon_start: 0.2,
            epsilon_decay: 0.0,
            epsilon_min: 0.9,
        }
        .sanitized();
        assert_eq!(cfg.alpha, 1.0);
        assert_eq!(cfg.gamma, 0.0);
        assert_eq!(cfg.epsilon_decay, 0.995);
        assert_eq!(cfg.epsilon_min, 0.2);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let cfg: LearningConfig = serde_json::from_str(r#"{"alpha": 0.5}"#).unwrap_or_default();
        assert_eq!(cfg.alpha, 0.5);
        assert_eq!(cfg.gamma, 0.95);
        let reward: RewardConfig = serde_json::from_str(r#"{"skip": -0.5}"#).unwrap_or_default();
        assert_eq!(reward.skip, -0.5);
        assert_eq!(reward.like, 1.0);
    }
}
