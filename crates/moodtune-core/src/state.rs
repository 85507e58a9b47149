//! Discretized recommendation state.
//!
//! A state is the lookup key of the value table: five trait bins plus the
//! situational context a recommendation is served in. Changing the bin count
//! changes every key, which is why persisted tables record the bin count they
//! were trained with.

use crate::profile::{PersonalityProfile, TRAIT_MAX};
use crate::tag::ParseTagError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{OffsetDateTime, UtcOffset};

pub const DEFAULT_BINS: u8 = 5;
pub const MAX_BINS: u8 = 20;

const TRAIT_PREFIXES: [char; 5] = ['o', 'c', 'e', 'a', 'n'];

tag_enum! {
    ContentType ("content type") {
        Music => "music",
        Video => "video",
        Game => "game",
    }
}

tag_enum! {
    /// Self-reported or inferred mood. Variants are grouped into three
    /// valence levels, see [`Mood::level`].
    Mood ("mood") {
        Anxious => "anxious",
        Sad => "sad",
        Stressed => "stressed",
        Angry => "angry",
        Neutral => "neutral",
        Tired => "tired",
        Relaxed => "relaxed",
        Calm => "calm",
        Happy => "happy",
        Energetic => "energetic",
    }
}

impl Mood {
    /// Ordered valence: distressed `-1` < neutral `0` < positive `1`.
    #[must_use]
    pub fn level(self) -> i8 {
        match self {
            Mood::Anxious | Mood::Sad | Mood::Stressed | Mood::Angry => -1,
            Mood::Neutral | Mood::Tired => 0,
            Mood::Relaxed | Mood::Calm | Mood::Happy | Mood::Energetic => 1,
        }
    }
}

tag_enum! {
    TimeOfDay ("time of day") {
        Morning => "morning",
        Afternoon => "afternoon",
        Evening => "evening",
        Night => "night",
    }
}

impl TimeOfDay {
    #[must_use]
    pub fn from_hour(hour: u8) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    /// Bucket for a timestamp, evaluated in UTC.
    #[must_use]
    pub fn from_timestamp(ts: OffsetDateTime) -> Self {
        Self::from_hour(ts.to_offset(UtcOffset::UTC).hour())
    }
}

/// Immutable lookup key. Trait bins are stored in canonical trait order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RecommendationState {
    pub trait_bins: [u8; 5],
    pub content_type: ContentType,
    pub mood: Mood,
    pub time_of_day: TimeOfDay,
}

impl RecommendationState {
    /// Canonical string form, e.g. `o4|c2|e1|a3|n1|music|relaxed|evening`.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RecommendationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (prefix, bin) in TRAIT_PREFIXES.iter().zip(self.trait_bins) {
            write!(f, "{prefix}{bin}|")?;
        }
        write!(f, "{}|{}|{}", self.content_type, self.mood, self.time_of_day)
    }
}

impl FromStr for RecommendationState {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseTagError {
            kind: "state",
            value: s.to_string(),
        };
        let parts: Vec<&str> = s.split('|').collect();
        if parts.len() != 8 {
            return Err(invalid());
        }
        let mut trait_bins = [0u8; 5];
        for (i, prefix) in TRAIT_PREFIXES.iter().enumerate() {
            trait_bins[i] = parts[i]
                .strip_prefix(*prefix)
                .and_then(|b| b.parse::<u8>().ok())
                .filter(|b| *b < MAX_BINS)
                .ok_or_else(invalid)?;
        }
        Ok(Self {
            trait_bins,
            content_type: parts[5].parse()?,
            mood: parts[6].parse()?,
            time_of_day: parts[7].parse()?,
        })
    }
}

/// Maps continuous profiles into [`RecommendationState`]s with a fixed bin count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEncoder {
    bins: u8,
}

impl Default for StateEncoder {
    fn default() -> Self {
        Self { bins: DEFAULT_BINS }
    }
}

impl StateEncoder {
    /// `bins` is clamped into `1..=MAX_BINS`.
    #[must_use]
    pub fn new(bins: u8) -> Self {
        Self {
            bins: bins.clamp(1, MAX_BINS),
        }
    }

    #[must_use]
    pub fn bins(&self) -> u8 {
        self.bins
    }

    /// `bin = min(floor(score / (100 / N)), N - 1)`.
    ///
    /// Scores on a bin edge land in the bin that starts at that edge.
    #[must_use]
    pub fn bin(&self, score: f64) -> u8 {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, TRAIT_MAX)
        };
        let width = TRAIT_MAX / f64::from(self.bins);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let raw = (score / width).floor() as u8;
        raw.min(self.bins - 1)
    }

    #[must_use]
    pub fn encode(
        &self,
        profile: &PersonalityProfile,
        content_type: ContentType,
        mood: Mood,
        time_of_day: TimeOfDay,
    ) -> RecommendationState {
        let scores = profile.scores();
        let mut trait_bins = [0u8; 5];
        for (bin, score) in trait_bins.iter_mut().zip(scores) {
            *bin = self.bin(score);
        }
        RecommendationState {
            trait_bins,
            content_type,
            mood,
            time_of_day,
        }
    }
}

/// Encodes with the default bin count.
#[must_use]
pub fn encode_state(
    profile: &PersonalityProfile,
    content_type: ContentType,
    mood: Mood,
    time_of_day: TimeOfDay,
) -> RecommendationState {
    StateEncoder::default().encode(profile, content_type, mood, time_of_day)
}
