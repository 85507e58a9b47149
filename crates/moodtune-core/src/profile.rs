//! Big-Five style trait scores.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const TRAIT_MIN: f64 = 0.0;
pub const TRAIT_MAX: f64 = 100.0;

const NEUTRAL_SCORE: f64 = 50.0;

tag_enum! {
    /// One of the five personality traits, in canonical order.
    Trait ("trait") {
        Openness => "openness",
        Conscientiousness => "conscientiousness",
        Extraversion => "extraversion",
        Agreeableness => "agreeableness",
        Neuroticism => "neuroticism",
    }
}

/// Five trait scores, each kept in `[0, 100]`.
///
/// Fields are private so every write goes through [`clamp_score`]; profiles
/// deserialized from storage are clamped on the way in.
///
/// `aggregated_through` is the time up to which insight deltas have been folded
/// into the scores. It is stored with the scores so both change in one commit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawScores")]
pub struct PersonalityProfile {
    openness: f64,
    conscientiousness: f64,
    extraversion: f64,
    agreeableness: f64,
    neuroticism: f64,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    aggregated_through: Option<OffsetDateTime>,
}

#[derive(Deserialize)]
struct RawScores {
    #[serde(default = "neutral")]
    openness: f64,
    #[serde(default = "neutral")]
    conscientiousness: f64,
    #[serde(default = "neutral")]
    extraversion: f64,
    #[serde(default = "neutral")]
    agreeableness: f64,
    #[serde(default = "neutral")]
    neuroticism: f64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    aggregated_through: Option<OffsetDateTime>,
}

fn neutral() -> f64 {
    NEUTRAL_SCORE
}

impl From<RawScores> for PersonalityProfile {
    fn from(raw: RawScores) -> Self {
        Self::new(
            raw.openness,
            raw.conscientiousness,
            raw.extraversion,
            raw.agreeableness,
            raw.neuroticism,
        )
        .with_aggregated_through(raw.aggregated_through)
    }
}

impl Default for PersonalityProfile {
    /// Neutral profile used when a user has not been assessed yet.
    fn default() -> Self {
        Self::new(
            NEUTRAL_SCORE,
            NEUTRAL_SCORE,
            NEUTRAL_SCORE,
            NEUTRAL_SCORE,
            NEUTRAL_SCORE,
        )
    }
}

impl PersonalityProfile {
    #[must_use]
    pub fn new(
        openness: f64,
        conscientiousness: f64,
        extraversion: f64,
        agreeableness: f64,
        neuroticism: f64,
    ) -> Self {
        Self {
            openness: clamp_score(openness),
            conscientiousness: clamp_score(conscientiousness),
            extraversion: clamp_score(extraversion),
            agreeableness: clamp_score(agreeableness),
            neuroticism: clamp_score(neuroticism),
            aggregated_through: None,
        }
    }

    #[must_use]
    pub fn get(&self, t: Trait) -> f64 {
        match t {
            Trait::Openness => self.openness,
            Trait::Conscientiousness => self.conscientiousness,
            Trait::Extraversion => self.extraversion,
            Trait::Agreeableness => self.agreeableness,
            Trait::Neuroticism => self.neuroticism,
        }
    }

    /// Returns a copy with `t` set to `value`, clamped into range.
    #[must_use]
    pub fn with(mut self, t: Trait, value: f64) -> Self {
        let value = clamp_score(value);
        match t {
            Trait::Openness => self.openness = value,
            Trait::Conscientiousness => self.conscientiousness = value,
            Trait::Extraversion => self.extraversion = value,
            Trait::Agreeableness => self.agreeableness = value,
            Trait::Neuroticism => self.neuroticism = value,
        }
        self
    }

    #[must_use]
    pub fn aggregated_through(&self) -> Option<OffsetDateTime> {
        self.aggregated_through
    }

    #[must_use]
    pub fn with_aggregated_through(mut self, watermark: Option<OffsetDateTime>) -> Self {
        self.aggregated_through = watermark;
        self
    }

    /// Scores in canonical trait order.
    #[must_use]
    pub fn scores(&self) -> [f64; 5] {
        [
            self.openness,
            self.conscientiousness,
            self.extraversion,
            self.agreeableness,
            self.neuroticism,
        ]
    }
}

/// Clamps into `[TRAIT_MIN, TRAIT_MAX]`; NaN maps to the neutral midpoint.
#[must_use]
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return NEUTRAL_SCORE;
    }
    value.clamp(TRAIT_MIN, TRAIT_MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn construction_clamps_out_of_range_scores() {
        let p = PersonalityProfile::new(-5.0, 150.0, f64::NAN, 42.0, f64::INFINITY);
        assert_eq!(p.scores(), [0.0, 100.0, 50.0, 42.0, 100.0]);
    }

    #[test]
    fn with_replaces_single_trait() {
        let p = PersonalityProfile::default().with(Trait::Extraversion, 101.0);
        assert_eq!(p.get(Trait::Extraversion), 100.0);
        assert_eq!(p.get(Trait::Openness), 50.0);
    }

    #[test]
    fn deserialization_clamps_and_defaults_missing_traits() {
        let p: PersonalityProfile =
            serde_json::from_str(r#"{"openness": 130, "neuroticism": -2}"#).unwrap();
        assert_eq!(p.get(Trait::Openness), 100.0);
        assert_eq!(p.get(Trait::Neuroticism), 0.0);
        assert_eq!(p.get(Trait::Agreeableness), 50.0);
    }

    #[test]
    fn watermark_is_optional_in_storage() {
        let p: PersonalityProfile = serde_json::from_str(
            r#"{"openness": 60, "aggregated_through": "2026-02-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            p.aggregated_through(),
            Some(time::macros::datetime!(2026-02-01 00:00 UTC))
        );

        let bare = serde_json::to_value(PersonalityProfile::default()).unwrap();
        assert!(bare.get("aggregated_through").is_none());
    }

    #[test]
    fn trait_tags_roundtrip_through_str() {
        for t in Trait::ALL {
            assert_eq!(t.as_str().parse::<Trait>().unwrap(), *t);
        }
        assert!("grumpiness".parse::<Trait>().is_err());
    }
}
