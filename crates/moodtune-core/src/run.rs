//! Append-only job log records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

tag_enum! {
    JobKind ("job kind") {
        RlTraining => "rl_training",
        PersonalityUpdate => "personality_update",
    }
}

/// Running reward summary. `min`/`max` are `None` until the first sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardStatistics {
    pub count: usize,
    pub total: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RewardStatistics {
    pub fn record(&mut self, reward: f64) {
        if !reward.is_finite() {
            return;
        }
        self.count += 1;
        self.total += reward;
        self.min = Some(self.min.map_or(reward, |m| m.min(reward)));
        self.max = Some(self.max.map_or(reward, |m| m.max(reward)));
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total / self.count as f64
        }
    }
}

/// Size of a value table after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub entries: usize,
    pub states: usize,
    pub epsilon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFailure {
    pub user_id: String,
    pub reason: String,
}

/// One row per job invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub job: JobKind,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub users_processed: usize,
    /// Users below the interaction threshold; expected, not a failure.
    #[serde(default)]
    pub users_skipped: usize,
    #[serde(default)]
    pub failures: Vec<UserFailure>,
    #[serde(default)]
    pub records_processed: usize,
    /// Records without serve-time action metadata.
    #[serde(default)]
    pub records_skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_reward: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableStats>,
    /// Mean absolute trait change over all committed users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_trait_shift: Option<f64>,
}

impl TrainingRun {
    #[must_use]
    pub fn started(job: JobKind, started_at: OffsetDateTime) -> Self {
        Self {
            job,
            started_at,
            finished_at: started_at,
            users_processed: 0,
            users_skipped: 0,
            failures: Vec::new(),
            records_processed: 0,
            records_skipped: 0,
            reward: None,
            mean_reward: None,
            table: None,
            mean_trait_shift: None,
        }
    }
}
