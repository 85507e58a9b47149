use moodtune_core::{
    enumerate_actions, ContentType, Mood, Policy, RecommendationState, TimeOfDay,
};
use moodtune_qlearn::{LearningConfig, QLearningAgent, ValueTable};
use std::time::Instant;

fn main() {
    let mut agent = QLearningAgent::new(LearningConfig::default(), ValueTable::new(5));
    let actions = enumerate_actions();
    let state = RecommendationState {
        trait_bins: [2, 2, 2, 2, 2],
        content_type: ContentType::Music,
        mood: Mood::Neutral,
        time_of_day: TimeOfDay::Evening,
    };

    let iterations: u32 = 1_000_000;

    // Warmup
    for _ in 0..1000 {
        agent.feedback(&state, actions[0], 1.0, None);
    }

    let start = Instant::now();
    for i in 0..iterations {
        agent.feedback(&state, actions[i as usize % actions.len()], 0.5, None);
    }
    let duration = start.elapsed();
    println!("Terminal updates on ONE state took: {:?}", duration);
    println!("Average per call: {:?}", duration / iterations);

    // Bootstrapped updates scan all 27 actions of the next state.
    let mut next = state;
    next.mood = Mood::Happy;
    let start = Instant::now();
    for i in 0..iterations {
        agent.feedback(&state, actions[i as usize % actions.len()], 0.5, Some(&next));
    }
    let duration = start.elapsed();
    println!("Bootstrapped updates took: {:?}", duration);
    println!("Average per call: {:?}", duration / iterations);

    // Spread updates over many distinct states.
    let mut agent = QLearningAgent::new(LearningConfig::default(), ValueTable::new(5));
    let start = Instant::now();
    let mut filled = 0u32;
    for a in 0..5u8 {
        for b in 0..5u8 {
            for c in 0..5u8 {
                let mut s = state;
                s.trait_bins = [a, b, c, 0, 0];
                for action in &actions {
                    agent.feedback(&s, *action, 1.0, None);
                    filled += 1;
                }
            }
        }
    }
    let duration = start.elapsed();
    println!("Filling {} entries took: {:?}", agent.table().len(), duration);
    println!("Average per call: {:?}", duration / filled);
}
