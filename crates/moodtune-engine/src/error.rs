use moodtune_core::StoreError;
use moodtune_qlearn::QLearnError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("A training run is already in progress")]
    TrainingInProgress,
    #[error("Training run exceeded {0:?} and was discarded")]
    TimedOut(Duration),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Value table could not be saved: {0}")]
    Persist(#[from] QLearnError),
    #[error("No personality profile for user {0}")]
    MissingProfile(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
