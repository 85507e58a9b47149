//! Scalar reward for one interaction.

use crate::config::RewardConfig;
use moodtune_core::{InteractionKind, InteractionRecord, Mood};

/// Additive reward: one contribution per distinct signal, a completion term
/// in `[0, completion_weight]` and a mood term in `[-mood_weight, mood_weight]`.
///
/// The total is not clamped; like + complete + share with full completion
/// and a mood lift exceeds 2.0.
#[must_use]
pub fn reward(interaction: &InteractionRecord, cfg: &RewardConfig) -> f64 {
    let mut seen = [false; 5];
    let mut total = 0.0;
    for kind in &interaction.kinds {
        if std::mem::replace(&mut seen[kind.index()], true) {
            continue;
        }
        total += match kind {
            InteractionKind::Like => cfg.like,
            InteractionKind::Dislike => cfg.dislike,
            InteractionKind::Share => cfg.share,
            InteractionKind::Complete => cfg.complete,
            InteractionKind::Skip => cfg.skip,
        };
    }
    total += completion_term(interaction.completion, cfg);
    total += mood_term(interaction.mood_before, interaction.mood_after, cfg);
    total
}

fn completion_term(fraction: Option<f64>, cfg: &RewardConfig) -> f64 {
    match fraction {
        Some(f) if f.is_finite() => f.clamp(0.0, 1.0) * cfg.completion_weight,
        _ => 0.0,
    }
}

/// Levels span `-1..=1`, so the difference spans `-2..=2`.
fn mood_term(before: Option<Mood>, after: Option<Mood>, cfg: &RewardConfig) -> f64 {
    match (before, after) {
        (Some(b), Some(a)) => f64::from(a.level() - b.level()) * cfg.mood_weight / 2.0,
        _ => 0.0,
    }
}
