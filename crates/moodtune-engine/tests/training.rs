use moodtune_core::{
    enumerate_actions, ContentType, InteractionKind, InteractionLog, InteractionRecord, JobKind,
    Mood, PersonalityProfile, RecommendationAction, RecommendationParams, StoreError, TimeOfDay,
};
use moodtune_engine::{Collaborators, Engine, EngineConfig, EngineError, MemoryStore};
use moodtune_qlearn::{MemoryTableStore, TableStore};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

fn fixed_now() -> OffsetDateTime {
    datetime!(2026-01-10 12:00 UTC)
}

fn record(user: &str, hours_ago: i64, action: Option<usize>, kinds: &[InteractionKind]) -> InteractionRecord {
    InteractionRecord {
        id: None,
        user_id: user.into(),
        content_type: ContentType::Music,
        kinds: kinds.to_vec(),
        completion: Some(1.0),
        mood_before: Some(Mood::Stressed),
        mood_after: Some(Mood::Relaxed),
        time_of_day: Some(TimeOfDay::Evening),
        ts: fixed_now() - Duration::hours(hours_ago),
        served_action: action.map(|i| enumerate_actions()[i]),
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    tables: Arc<MemoryTableStore>,
    engine: Engine,
}

fn fixture(config: EngineConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let tables = Arc::new(MemoryTableStore::new());
    let engine = Engine::new(config, Collaborators::in_memory(store.clone(), tables.clone()))
        .expect("valid config")
        .with_clock(fixed_now);
    Fixture {
        store,
        tables,
        engine,
    }
}

fn scenario_profile() -> PersonalityProfile {
    PersonalityProfile::new(85.0, 50.0, 35.0, 50.0, 25.0)
}

#[test]
fn training_isolates_users_and_logs_one_run() {
    let f = fixture(EngineConfig::default());
    f.store.set_profile("alice", scenario_profile());
    for h in 1..=5 {
        f.store
            .push_interaction(record("alice", h, Some(4), &[InteractionKind::Like]));
    }
    f.store.push_interaction(record("alice", 6, None, &[InteractionKind::Like]));

    f.store.set_profile("bob", PersonalityProfile::default());
    for h in 1..=2 {
        f.store.push_interaction(record("bob", h, Some(0), &[InteractionKind::Skip]));
    }

    for h in 1..=5 {
        f.store
            .push_interaction(record("carol", h, Some(1), &[InteractionKind::Share]));
    }

    let report = f.engine.trigger_rl_training().expect("training succeeds");
    let run = &report.run;
    assert_eq!(run.job, JobKind::RlTraining);
    assert_eq!(run.users_processed, 1);
    assert_eq!(run.users_skipped, 1);
    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].user_id, "carol");
    assert_eq!(run.records_processed, 5);
    assert_eq!(run.records_skipped, 1);

    let table = run.table.expect("table stats");
    assert_eq!(table.entries, 1);
    assert_eq!(table.states, 1);
    assert!((table.epsilon - 0.3 * 0.995).abs() < 1e-12);

    // like 1.0 + completion 0.5 + mood lift 0.5
    assert!((run.mean_reward.expect("mean") - 2.0).abs() < 1e-9);
    assert_eq!(report.by_action.len(), 1);
    assert_eq!(report.by_action[&enumerate_actions()[4].key()].count, 5);

    assert_eq!(f.store.runs().len(), 1);
    assert!(f.tables.raw().is_some());
    assert_eq!(f.tables.load(5).meta.runs, 1);
}

#[test]
fn scenario_single_update_reaches_expected_value() {
    let f = fixture(EngineConfig::default());
    f.store.set_profile("u1", scenario_profile());
    let mut r = record("u1", 1, Some(7), &[InteractionKind::Like, InteractionKind::Complete]);
    r.completion = Some(0.6);
    f.store.push_interaction(r);

    f.engine.run_training(7, 1).expect("training succeeds");
    let rec = f.engine.recommend(
        "u1",
        &scenario_profile(),
        ContentType::Music,
        Mood::Stressed,
        TimeOfDay::Evening,
    );
    assert_eq!(rec.state, "o4|c2|e1|a2|n1|music|stressed|evening");
    assert_eq!(rec.decision.action, enumerate_actions()[7]);
    // like 1.0 + complete 0.5 + completion 0.3 + mood lift 0.5, α = 0.1
    assert!((rec.decision.score - 0.23).abs() < 1e-9);
    assert_eq!(rec.decision.why, "exploit q");
}

#[test]
fn records_outside_window_are_ignored() {
    let f = fixture(EngineConfig::default());
    f.store.set_profile("u1", scenario_profile());
    for _ in 0..5 {
        f.store
            .push_interaction(record("u1", 24 * 8, Some(2), &[InteractionKind::Like]));
    }
    let report = f.engine.trigger_rl_training().expect("training succeeds");
    assert_eq!(report.run.users_processed, 0);
    assert_eq!(report.run.records_processed, 0);
    assert_eq!(report.run.table.expect("stats").entries, 0);
}

#[test]
fn rerun_on_same_window_keeps_reward_statistics() {
    let f = fixture(EngineConfig::default());
    f.store.set_profile("u1", scenario_profile());
    for h in 1..=6 {
        let kinds: &[InteractionKind] = if h % 2 == 0 {
            &[InteractionKind::Like]
        } else {
            &[InteractionKind::Skip]
        };
        f.store.push_interaction(record("u1", h, Some(h as usize), kinds));
    }
    let first = f.engine.trigger_rl_training().expect("first run");
    let second = f.engine.trigger_rl_training().expect("second run");
    assert_eq!(first.run.reward, second.run.reward);
    assert_eq!(first.run.records_processed, second.run.records_processed);
    assert_eq!(first.by_action, second.by_action);
    assert_eq!(
        first.run.table.expect("stats").entries,
        second.run.table.expect("stats").entries
    );
    assert!(second.run.table.expect("stats").epsilon < first.run.table.expect("stats").epsilon);
    assert_eq!(f.store.runs().len(), 2);
}

#[test]
fn timed_out_run_persists_nothing() {
    let mut config = EngineConfig::default();
    config.training.max_duration_secs = Some(0);
    let f = fixture(config);
    f.store.set_profile("u1", scenario_profile());
    for h in 1..=5 {
        f.store.push_interaction(record("u1", h, Some(3), &[InteractionKind::Like]));
    }
    let err = f.engine.trigger_rl_training().expect_err("must time out");
    assert!(matches!(err, EngineError::TimedOut(_)));
    assert!(f.tables.raw().is_none());
    assert!(f.store.runs().is_empty());
    assert_eq!(f.engine.table_stats().entries, 0);
}

#[test]
fn cold_start_serves_default_params() {
    let f = fixture(EngineConfig::default());
    let params = f.engine.get_recommendation_params(
        "brand-new",
        &PersonalityProfile::default(),
        ContentType::Game,
        Mood::Anxious,
        TimeOfDay::Night,
    );
    assert_eq!(params, RecommendationParams::fallback());
    assert_eq!(params, RecommendationAction::cold_start().to_params());
}

#[test]
fn corrupt_persisted_table_starts_empty() {
    let store = Arc::new(MemoryStore::new());
    let tables = Arc::new(MemoryTableStore::with_raw("{\"bins\": 5, \"entries\": [}"));
    let engine = Engine::new(
        EngineConfig::default(),
        Collaborators::in_memory(store, tables),
    )
    .expect("engine starts");
    assert_eq!(engine.table_stats().entries, 0);
    let rec = engine.recommend(
        "u",
        &PersonalityProfile::default(),
        ContentType::Video,
        Mood::Calm,
        TimeOfDay::Morning,
    );
    assert_eq!(rec.decision.why, "cold start default");
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = EngineConfig::default();
    config.bins = 0;
    let store = Arc::new(MemoryStore::new());
    let result = Engine::new(
        config,
        Collaborators::in_memory(store, Arc::new(MemoryTableStore::new())),
    );
    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[test]
fn reload_picks_up_externally_saved_table() {
    let f = fixture(EngineConfig::default());
    let state = moodtune_core::encode_state(
        &scenario_profile(),
        ContentType::Music,
        Mood::Happy,
        TimeOfDay::Morning,
    );
    let mut table = moodtune_qlearn::ValueTable::new(5);
    table.set(state, enumerate_actions()[20], 0.8);
    f.tables.save(&table).expect("save");

    assert_eq!(f.engine.table_stats().entries, 0);
    f.engine.reload();
    let params = f.engine.get_recommendation_params(
        "u",
        &scenario_profile(),
        ContentType::Music,
        Mood::Happy,
        TimeOfDay::Morning,
    );
    assert_eq!(params, enumerate_actions()[20].to_params());
}

/// Blocks inside the first fetch until released, so a second run can be
/// attempted while the first holds the run lock.
struct GateLog {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl InteractionLog for GateLog {
    fn interactions_since(
        &self,
        _since: OffsetDateTime,
    ) -> Result<Vec<InteractionRecord>, StoreError> {
        let _ = self.entered.lock().expect("sender").send(());
        let _ = self.release.lock().expect("receiver").recv();
        Ok(Vec::new())
    }
}

#[test]
fn concurrent_training_runs_are_rejected() {
    let (entered_tx, entered_rx) = channel();
    let (release_tx, release_rx) = channel();
    let store = Arc::new(MemoryStore::new());
    let mut stores = Collaborators::in_memory(store, Arc::new(MemoryTableStore::new()));
    stores.interactions = Arc::new(GateLog {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let engine = Arc::new(
        Engine::new(EngineConfig::default(), stores)
            .expect("engine")
            .with_clock(fixed_now),
    );

    let background = {
        let engine = engine.clone();
        std::thread::spawn(move || engine.trigger_rl_training())
    };
    entered_rx.recv().expect("first run started");
    let second = engine.trigger_rl_training();
    assert!(matches!(second, Err(EngineError::TrainingInProgress)));

    release_tx.send(()).expect("release");
    let first = background.join().expect("thread");
    assert!(first.is_ok());
}
