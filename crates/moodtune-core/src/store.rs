//! Collaborator interfaces.
//!
//! The engine never talks to a database directly; it is handed
//! implementations of these traits. Methods take `&self` so one store can be
//! shared between jobs behind an `Arc`; implementations provide their own
//! interior mutability.

use crate::event::{InsightDelta, InsightOrigin, InteractionRecord};
use crate::profile::PersonalityProfile;
use crate::run::TrainingRun;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Commit rejected: {0}")]
    Commit(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read-only access to served-item feedback.
pub trait InteractionLog {
    /// All records with `ts >= since`, in any order.
    fn interactions_since(&self, since: OffsetDateTime) -> Result<Vec<InteractionRecord>>;
}

pub trait ProfileStore {
    fn profile(&self, user_id: &str) -> Result<Option<PersonalityProfile>>;

    /// Replaces all five trait scores in one write. Either the whole profile
    /// is stored or the call fails and nothing changes.
    fn commit_profile(&self, user_id: &str, profile: &PersonalityProfile) -> Result<()>;

    fn user_ids(&self) -> Result<Vec<String>>;
}

pub trait InsightFeed {
    fn insights_since(
        &self,
        user_id: &str,
        origin: InsightOrigin,
        since: OffsetDateTime,
    ) -> Result<Vec<InsightDelta>>;
}

pub trait RunLog {
    fn append(&self, run: &TrainingRun) -> Result<()>;
}
