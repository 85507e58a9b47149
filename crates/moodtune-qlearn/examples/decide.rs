use std::io::{self, Read};

use moodtune_core::{
    encode_state, ContentType, Decision, Mood, PersonalityProfile, Policy, RecommendationParams,
    TimeOfDay,
};
use moodtune_qlearn::{LearningConfig, QLearningAgent, ValueTable};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct Request {
    #[serde(default)]
    profile: PersonalityProfile,
    #[serde(default = "default_content")]
    content_type: ContentType,
    #[serde(default = "default_mood")]
    mood: Mood,
    #[serde(default = "default_time")]
    time_of_day: TimeOfDay,
}

fn default_content() -> ContentType {
    ContentType::Music
}

fn default_mood() -> Mood {
    Mood::Neutral
}

fn default_time() -> TimeOfDay {
    TimeOfDay::Evening
}

#[derive(Serialize)]
struct Record {
    state: String,
    decision: Decision,
    params: RecommendationParams,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let req: Request = if input.trim().is_empty() {
        serde_json::from_str("{}")?
    } else {
        serde_json::from_str(&input)?
    };

    let state = encode_state(&req.profile, req.content_type, req.mood, req.time_of_day);
    let mut agent = QLearningAgent::new(LearningConfig::default(), ValueTable::new(5));
    let decision = agent.decide(&state, false);

    let record = Record {
        state: state.key(),
        params: decision.action.to_params(),
        decision,
    };
    serde_json::to_writer_pretty(io::stdout(), &record)?;
    println!();
    Ok(())
}
