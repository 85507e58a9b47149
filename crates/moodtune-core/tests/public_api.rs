use moodtune_core::{
    encode_state, enumerate_actions, ContentType, Decision, Diversity, Energy, Mood, Novelty,
    PersonalityProfile, RecommendationAction, RecommendationParams, TimeOfDay,
};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct RecommendRecord {
    decision: Decision,
    params: RecommendationParams,
}

#[test]
fn decision_fixture_matches_action_params() {
    let record: RecommendRecord =
        serde_json::from_str(include_str!("fixtures/decision.ok.json"))
            .expect("Failed to deserialize decision fixture");

    let expected = RecommendationAction::new(Energy::Medium, Diversity::Balanced, Novelty::Mixed);
    assert_eq!(record.decision.action, expected);
    assert!(!record.decision.explored);

    let params = expected.to_params();
    assert_eq!(params.category_count, record.params.category_count);
    assert_eq!(params.popularity_min, record.params.popularity_min);
    assert!((params.valence_target - record.params.valence_target).abs() < 1e-9);
}

#[test]
fn state_keys_are_unique_per_context() {
    let profile = PersonalityProfile::new(85.0, 50.0, 35.0, 60.0, 25.0);
    let mut keys = std::collections::HashSet::new();
    for content in ContentType::ALL {
        for mood in Mood::ALL {
            for time in TimeOfDay::ALL {
                keys.insert(encode_state(&profile, *content, *mood, *time).key());
            }
        }
    }
    assert_eq!(
        keys.len(),
        ContentType::ALL.len() * Mood::ALL.len() * TimeOfDay::ALL.len()
    );
}

#[test]
fn every_state_action_key_is_distinct() {
    let state = encode_state(
        &PersonalityProfile::default(),
        ContentType::Video,
        Mood::Calm,
        TimeOfDay::Morning,
    );
    let keys: std::collections::HashSet<String> = enumerate_actions()
        .iter()
        .map(|a| format!("{}::{}", state.key(), a.key()))
        .collect();
    assert_eq!(keys.len(), 27);
}
