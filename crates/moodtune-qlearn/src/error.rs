use thiserror::Error;

#[derive(Debug, Error)]
pub enum QLearnError {
    #[error("Snapshot deserialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Table I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Table was trained with {found} bins, expected {expected}")]
    BinMismatch { expected: u8, found: u8 },
    #[error("Invalid table key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, QLearnError>;
