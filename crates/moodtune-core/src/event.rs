//! Records produced by collaborators outside this crate.
//!
//! [`InteractionRecord`]s come from the recommendation-serving layer and
//! [`InsightDelta`]s from the chat-sentiment and entertainment analysers.
//! Both are consumed read-only.

use crate::action::RecommendationAction;
use crate::profile::Trait;
use crate::state::{ContentType, Mood, TimeOfDay};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

tag_enum! {
    /// Feedback signal attached to a served item.
    InteractionKind ("interaction kind") {
        Like => "like",
        Dislike => "dislike",
        Complete => "complete",
        Skip => "skip",
        Share => "share",
    }
}

tag_enum! {
    InsightOrigin ("insight origin") {
        ChatSentiment => "chat_sentiment",
        Entertainment => "entertainment",
    }
}

/// One feedback event for one served item.
///
/// `served_action` is written by the serving layer at serve time and never
/// mutated; it cannot be reconstructed afterwards. Records without it are
/// skipped during training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub content_type: ContentType,
    /// Signals observed for this item; `like` + `complete` + `share` may co-occur.
    #[serde(default)]
    pub kinds: Vec<InteractionKind>,
    /// Fraction of the item consumed, `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_before: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_after: Option<Mood>,
    /// Explicit serve-time bucket; derived from `ts` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeOfDay>,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_action: Option<RecommendationAction>,
}

impl InteractionRecord {
    #[must_use]
    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day
            .unwrap_or_else(|| TimeOfDay::from_timestamp(self.ts))
    }

    /// Mood the item was served under; `neutral` when unknown.
    #[must_use]
    pub fn serve_mood(&self) -> Mood {
        self.mood_before.unwrap_or(Mood::Neutral)
    }
}

/// A small signed adjustment per trait, observed by one analyser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightDelta {
    pub user_id: String,
    pub origin: InsightOrigin,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    #[serde(default)]
    pub deltas: BTreeMap<Trait, f64>,
}
