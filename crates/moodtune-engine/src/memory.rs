//! In-memory collaborators for tests and embedding.

use moodtune_core::store::Result;
use moodtune_core::{
    InsightDelta, InsightFeed, InsightOrigin, InteractionLog, InteractionRecord,
    PersonalityProfile, ProfileStore, RunLog, StoreError, TrainingRun,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

#[derive(Debug, Default)]
struct Inner {
    interactions: Vec<InteractionRecord>,
    profiles: BTreeMap<String, PersonalityProfile>,
    insights: Vec<InsightDelta>,
    runs: Vec<TrainingRun>,
    rejected_commits: BTreeSet<String>,
}

/// Implements every collaborator trait over plain vectors and maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn lock_for_write(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn push_interaction(&self, record: InteractionRecord) {
        self.lock_for_write().interactions.push(record);
    }

    pub fn push_insight(&self, delta: InsightDelta) {
        self.lock_for_write().insights.push(delta);
    }

    pub fn set_profile(&self, user_id: &str, profile: PersonalityProfile) {
        self.lock_for_write()
            .profiles
            .insert(user_id.to_string(), profile);
    }

    /// Makes every later `commit_profile` for `user_id` fail.
    pub fn reject_commits_for(&self, user_id: &str) {
        self.lock_for_write()
            .rejected_commits
            .insert(user_id.to_string());
    }

    #[must_use]
    pub fn runs(&self) -> Vec<TrainingRun> {
        self.lock_for_write().runs.clone()
    }
}

impl InteractionLog for MemoryStore {
    fn interactions_since(&self, since: OffsetDateTime) -> Result<Vec<InteractionRecord>> {
        Ok(self
            .lock()?
            .interactions
            .iter()
            .filter(|r| r.ts >= since)
            .cloned()
            .collect())
    }
}

impl ProfileStore for MemoryStore {
    fn profile(&self, user_id: &str) -> Result<Option<PersonalityProfile>> {
        Ok(self.lock()?.profiles.get(user_id).copied())
    }

    fn commit_profile(&self, user_id: &str, profile: &PersonalityProfile) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.rejected_commits.contains(user_id) {
            return Err(StoreError::Commit(format!("commit rejected for {user_id}")));
        }
        inner.profiles.insert(user_id.to_string(), *profile);
        Ok(())
    }

    fn user_ids(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.profiles.keys().cloned().collect())
    }
}

impl InsightFeed for MemoryStore {
    fn insights_since(
        &self,
        user_id: &str,
        origin: InsightOrigin,
        since: OffsetDateTime,
    ) -> Result<Vec<InsightDelta>> {
        Ok(self
            .lock()?
            .insights
            .iter()
            .filter(|d| d.user_id == user_id && d.origin == origin && d.ts >= since)
            .cloned()
            .collect())
    }
}

impl RunLog for MemoryStore {
    fn append(&self, run: &TrainingRun) -> Result<()> {
        self.lock()?.runs.push(run.clone());
        Ok(())
    }
}
