//! Personality drift from accumulated insight deltas.
//!
//! Deltas from every origin are summed unweighted, multiplied by the
//! dampening factor and added to the current scores. Short windows of strong
//! signal move a trait by a fraction of a point; only sustained patterns add
//! up to visible shifts.

use crate::error::{EngineError, Result};
use moodtune_core::{InsightDelta, PersonalityProfile, Trait};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitChange {
    #[serde(rename = "trait")]
    pub trait_: Trait,
    pub old: f64,
    pub new: f64,
    /// `new - old`, after clamping.
    pub delta: f64,
}

/// Outcome of one committed aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitChangeReport {
    pub user_id: String,
    pub insights_used: usize,
    pub changes: Vec<TraitChange>,
    #[serde(with = "time::serde::rfc3339")]
    pub committed_at: OffsetDateTime,
}

impl TraitChangeReport {
    #[must_use]
    pub fn change(&self, t: Trait) -> Option<&TraitChange> {
        self.changes.iter().find(|c| c.trait_ == t)
    }

    /// Mean absolute change across the five traits.
    #[must_use]
    pub fn mean_abs_delta(&self) -> f64 {
        if self.changes.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.changes.iter().map(|c| c.delta.abs()).sum::<f64>() / self.changes.len() as f64
        }
    }
}

/// Per-trait sum in canonical trait order. Non-finite deltas are dropped.
#[must_use]
pub fn sum_deltas<'a>(deltas: impl IntoIterator<Item = &'a InsightDelta>) -> [f64; 5] {
    let mut sums = [0.0; 5];
    for delta in deltas {
        for (t, value) in &delta.deltas {
            if value.is_finite() {
                sums[t.index()] += value;
            }
        }
    }
    sums
}

/// `clamp(current + sum * dampening, 0, 100)` for every trait.
#[must_use]
pub fn apply_dampened(
    current: &PersonalityProfile,
    sums: [f64; 5],
    dampening: f64,
) -> (PersonalityProfile, Vec<TraitChange>) {
    let mut updated = *current;
    let mut changes = Vec::with_capacity(Trait::ALL.len());
    for &t in Trait::ALL {
        let old = current.get(t);
        updated = updated.with(t, old + sums[t.index()] * dampening);
        let new = updated.get(t);
        changes.push(TraitChange {
            trait_: t,
            old,
            new,
            delta: new - old,
        });
    }
    (updated, changes)
}

/// A delta is folded in once: inside the window, after the watermark and
/// not in the future.
#[must_use]
pub fn is_pending(
    delta: &InsightDelta,
    user_id: &str,
    window_start: OffsetDateTime,
    watermark: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> bool {
    delta.user_id == user_id
        && delta.ts >= window_start
        && delta.ts <= now
        && watermark.map_or(true, |w| delta.ts > w)
}

pub(crate) fn ensure_profile(
    user_id: &str,
    profile: Option<PersonalityProfile>,
) -> Result<PersonalityProfile> {
    profile.ok_or_else(|| EngineError::MissingProfile(user_id.to_string()))
}
