//! File-backed collaborators under one data directory.
//!
//! Layout:
//!
//! - `interactions.jsonl`: one [`InteractionRecord`] per line
//! - `insights.jsonl`: one [`InsightDelta`] per line
//! - `profiles.json`: object mapping user id to trait scores
//! - `runs.jsonl`: one [`TrainingRun`] appended per job
//! - `qtable.json`: the persisted value table
//!
//! Missing files read as empty. Malformed JSONL lines are skipped with a
//! warning so one bad producer cannot stall training.

use moodtune_core::store::Result;
use moodtune_core::{
    InsightDelta, InsightFeed, InsightOrigin, InteractionLog, InteractionRecord,
    PersonalityProfile, ProfileStore, RunLog, StoreError, TrainingRun,
};
use moodtune_engine::Collaborators;
use moodtune_qlearn::JsonFileTableStore;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

pub const INTERACTIONS_FILE: &str = "interactions.jsonl";
pub const INSIGHTS_FILE: &str = "insights.jsonl";
pub const PROFILES_FILE: &str = "profiles.json";
pub const RUNS_FILE: &str = "runs.jsonl";
pub const TABLE_FILE: &str = "qtable.json";
pub const LOCK_FILE: &str = "train.lock";

/// Builds the collaborator set for `dir`.
pub fn collaborators(dir: &Path) -> Collaborators {
    let profiles = Arc::new(JsonProfileStore::new(dir.join(PROFILES_FILE)));
    Collaborators {
        tables: Arc::new(JsonFileTableStore::new(dir.join(TABLE_FILE))),
        interactions: Arc::new(JsonlInteractionLog {
            path: dir.join(INTERACTIONS_FILE),
        }),
        profiles,
        insights: Arc::new(JsonlInsightFeed {
            path: dir.join(INSIGHTS_FILE),
        }),
        runs: Arc::new(JsonlRunLog {
            path: dir.join(RUNS_FILE),
        }),
    }
}

/// Parses every well-formed line of a JSONL file.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut items = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!("{}:{}: skipping malformed line: {}", path.display(), idx + 1, e),
        }
    }
    Ok(items)
}

pub struct JsonlInteractionLog {
    path: PathBuf,
}

impl InteractionLog for JsonlInteractionLog {
    fn interactions_since(&self, since: OffsetDateTime) -> Result<Vec<InteractionRecord>> {
        let mut records: Vec<InteractionRecord> = read_jsonl(&self.path)?;
        records.retain(|r| r.ts >= since);
        Ok(records)
    }
}

pub struct JsonlInsightFeed {
    path: PathBuf,
}

impl InsightFeed for JsonlInsightFeed {
    fn insights_since(
        &self,
        user_id: &str,
        origin: InsightOrigin,
        since: OffsetDateTime,
    ) -> Result<Vec<InsightDelta>> {
        let mut deltas: Vec<InsightDelta> = read_jsonl(&self.path)?;
        deltas.retain(|d| d.user_id == user_id && d.origin == origin && d.ts >= since);
        Ok(deltas)
    }
}

/// Profiles kept in a single JSON object. Commits rewrite the whole file
/// through a temporary sibling, so readers never see a partial profile.
pub struct JsonProfileStore {
    path: PathBuf,
    write: Mutex<()>,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, PersonalityProfile>> {
        match File::open(&self.path) {
            Ok(f) => Ok(serde_json::from_reader(BufReader::new(f))?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, profiles: &BTreeMap<String, PersonalityProfile>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, profiles)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ProfileStore for JsonProfileStore {
    fn profile(&self, user_id: &str) -> Result<Option<PersonalityProfile>> {
        Ok(self.read_all()?.get(user_id).copied())
    }

    fn commit_profile(&self, user_id: &str, profile: &PersonalityProfile) -> Result<()> {
        let _guard = self
            .write
            .lock()
            .map_err(|_| StoreError::Unavailable("profile writer poisoned".into()))?;
        let mut all = self.read_all()?;
        all.insert(user_id.to_string(), *profile);
        self.write_all(&all)
            .map_err(|e| StoreError::Commit(format!("{user_id}: {e}")))
    }

    fn user_ids(&self) -> Result<Vec<String>> {
        Ok(self.read_all()?.into_keys().collect())
    }
}

pub struct JsonlRunLog {
    path: PathBuf,
}

impl RunLog for JsonlRunLog {
    fn append(&self, run: &TrainingRun) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(run)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Exclusive marker file for a training run across processes. Removed on
/// drop; a stale file left by a crashed run has to be deleted by hand.
#[derive(Debug)]
pub struct TrainLock {
    path: PathBuf,
}

impl TrainLock {
    pub fn acquire(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { path })
    }
}

impl Drop for TrainLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("could not remove {}: {}", self.path.display(), e);
        }
    }
}
