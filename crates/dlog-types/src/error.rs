use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid ledger id: {0}")]
    InvalidLedgerId(String),

    #[error("invalid log name {name:?}: {reason}")]
    InvalidLogName { name: String, reason: String },

    #[error("segment {0} is already completed")]
    SegmentCompleted(String),
}
