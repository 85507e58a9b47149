//! Engine configuration.
//!
//! One struct is handed to [`Engine::new`](crate::Engine::new); nothing is
//! read from ambient state. Every field has a default so partial JSON files
//! are accepted.

use crate::error::{EngineError, Result};
use moodtune_core::state::{DEFAULT_BINS, MAX_BINS};
use moodtune_qlearn::{LearningConfig, RewardConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub window_days: u32,
    pub min_interactions_per_user: usize,
    /// Runs taking longer are discarded without persisting anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration_secs: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            min_interactions_per_user: 5,
            max_duration_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub window_days: u32,
    /// Multiplier on the summed deltas; a low-pass filter on trait drift.
    pub dampening: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            dampening: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Equal-width bins per trait. Changing it invalidates persisted tables.
    pub bins: u8,
    pub learning: LearningConfig,
    pub reward: RewardConfig,
    pub training: TrainingConfig,
    pub aggregation: AggregationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            learning: LearningConfig::default(),
            reward: RewardConfig::default(),
            training: TrainingConfig::default(),
            aggregation: AggregationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Rejects values with no sensible interpretation and clamps the
    /// learning rates into range.
    pub fn validate(mut self) -> Result<Self> {
        if self.bins == 0 || self.bins > MAX_BINS {
            return Err(EngineError::Config(format!(
                "bins must be within 1..={MAX_BINS}, got {}",
                self.bins
            )));
        }
        if self.training.window_days == 0 || self.aggregation.window_days == 0 {
            return Err(EngineError::Config("window_days must be positive".into()));
        }
        validate_dampening(self.aggregation.dampening)?;
        self.learning = self.learning.sanitized();
        Ok(self)
    }
}

pub(crate) fn validate_dampening(dampening: f64) -> Result<f64> {
    if dampening.is_finite() && (0.0..=1.0).contains(&dampening) {
        Ok(dampening)
    } else {
        Err(EngineError::Config(format!(
            "dampening must be within [0, 1], got {dampening}"
        )))
    }
}
